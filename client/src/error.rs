use crate::registry::Detach;
use thiserror::Error;

/// Failures a caller can observe from a session
///
/// Lines the client does not recognise are never errors; only the transport
/// and the login exchange surface failures.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("authentication failed: invalid password")]
    Authentication,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("command cancelled before completion")]
    Cancelled,

    #[error("transport error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SessionError>;

impl From<Detach> for SessionError {
    fn from(reason: Detach) -> Self {
        match reason {
            Detach::Cancelled => SessionError::Cancelled,
            Detach::Closed => SessionError::ConnectionClosed,
        }
    }
}
