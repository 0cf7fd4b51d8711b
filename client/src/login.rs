//! Login exchange
//!
//! ```text
//! AwaitingLoginPrompt -> AwaitingPasswordPrompt (with credentials)
//!                     -> AwaitingSessionBanner -> AwaitingIdlePrompt -> Ready
//! ```
//!
//! Any state before `Ready` may end in `Failed` on an invalid password line.

use crate::command::Reply;
use crate::error::{Result, SessionError};
use crate::registry::{Detach, Flow, LineListener, Outbox};
use log::{debug, info, warn};
use protocol::{Catalog, LogicalLine, SessionLine};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Handle sent when no credentials are given
pub const GUEST_HANDLE: &str = "guest";

#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Result of a successful login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    /// Handle the server assigned, as printed in its session banner
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    AwaitingLoginPrompt,
    AwaitingPasswordPrompt,
    AwaitingSessionBanner,
    AwaitingIdlePrompt,
    Ready,
    Failed,
}

pub struct LoginListener {
    catalog: Catalog,
    credentials: Option<Credentials>,
    setup_commands: Vec<String>,
    state: LoginState,
    username: Option<String>,
    reply: Option<oneshot::Sender<Result<LoginOutcome>>>,
}

impl LoginListener {
    pub fn new(
        catalog: Catalog,
        credentials: Option<Credentials>,
        setup_commands: Vec<String>,
    ) -> (Self, Reply<LoginOutcome>) {
        let (tx, reply) = Reply::channel();

        let listener = Self {
            catalog,
            credentials,
            setup_commands,
            state: LoginState::AwaitingLoginPrompt,
            username: None,
            reply: Some(tx),
        };

        (listener, reply)
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn resolve(&mut self, outcome: Result<LoginOutcome>) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(outcome);
        }
    }

    fn advance(&mut self, event: SessionLine, outbox: &mut Outbox) {
        use LoginState::*;

        match (self.state, event) {
            (Ready | Failed, _) => {}

            (_, SessionLine::InvalidPassword) => {
                warn!("Server rejected the password");
                self.state = Failed;
                self.resolve(Err(SessionError::Authentication));
            }

            (AwaitingLoginPrompt, SessionLine::LoginPrompt) => match &self.credentials {
                Some(credentials) => {
                    outbox.send(credentials.username.clone());
                    self.state = AwaitingPasswordPrompt;
                }
                None => {
                    outbox.send(GUEST_HANDLE);
                    self.state = AwaitingSessionBanner;
                }
            },

            (AwaitingPasswordPrompt, SessionLine::PasswordPrompt) => {
                if let Some(credentials) = &self.credentials {
                    outbox.send(credentials.password.clone());
                }
                self.state = AwaitingSessionBanner;
            }

            (AwaitingPasswordPrompt | AwaitingSessionBanner, SessionLine::ReturnPrompt) => {
                outbox.send("");
                self.state = AwaitingSessionBanner;
            }

            (AwaitingSessionBanner, SessionLine::SessionStarting { username }) => {
                info!("Session starting as {}", username);
                self.username = Some(username);
                self.state = AwaitingIdlePrompt;
            }

            (AwaitingIdlePrompt, SessionLine::IdlePrompt) => {
                for command in &self.setup_commands {
                    outbox.send(command.clone());
                }
                outbox.arm_keepalive();
                self.state = Ready;

                let username = self.username.take().unwrap_or_default();
                self.resolve(Ok(LoginOutcome { username }));
            }

            (state, event) => debug!("Ignoring {:?} while {:?}", event, state),
        }
    }
}

impl LineListener for LoginListener {
    fn on_line(&mut self, line: &LogicalLine, outbox: &mut Outbox) -> Flow {
        if let Some(event) = self.catalog.classify_session(line) {
            self.advance(event, outbox);
        }

        match self.state {
            LoginState::Ready | LoginState::Failed => Flow::Done,
            _ => Flow::Continue,
        }
    }

    fn on_detach(&mut self, reason: Detach) {
        self.resolve(Err(reason.into()));
    }
}
