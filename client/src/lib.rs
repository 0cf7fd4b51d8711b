//! # FICS Session Client Library
//!
//! This library drives one connection to a FICS-style chess server. The server
//! speaks a human-readable line protocol with no framing and no request ids:
//! command responses, chat, game updates and prompts all arrive interleaved on
//! the same stream. The client turns that stream into typed replies and
//! event streams.
//!
//! ## Architecture Overview
//!
//! ### One Reader, One Writer
//! A single transport loop owns the connection. It feeds every chunk it reads
//! into the session core and writes whatever commands the core produced. The
//! public [`Session`] handle only sends messages to that loop, so no component
//! ever needs a lock around the socket.
//!
//! ### Correlation by Grammar
//! Every command subscribes a listener before it is written. The listener sees
//! each logical line in arrival order and recognises the end of its response
//! from the line grammar alone, for example `42 games displayed.` or the idle
//! prompt.
//!
//! ### Serialized Listings
//! Listings such as `games`, `who`, `sought`, `moves` and `eco` end with
//! generic sentinels that cannot be told apart if two of them overlap. They go
//! through a FIFO so that at most one is on the wire at a time. Commands whose
//! acknowledgement names a game, channel or handle bypass it.
//!
//! ## Module Organization
//!
//! ### Registry Module (`registry`)
//! The listener set, with in-order delivery and self-unsubscription.
//!
//! ### Command Module (`command`)
//! The correlator and every command the client knows how to issue.
//!
//! ### Queue Module (`queue`)
//! The FIFO for blocking commands.
//!
//! ### Login Module (`login`)
//! The credential exchange up to the first idle prompt.
//!
//! ### Observe Module (`observe`)
//! Per-game watches producing start, move and chat events.
//!
//! ### Chat Module (`chat`)
//! Open-ended chat and raw line feeds.
//!
//! ### Engine and Session Modules (`engine`, `session`)
//! The synchronous core and the async loop around it.
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::{Session, SessionConfig};
//!
//! # async fn demo() -> client::Result<()> {
//! let session = Session::connect(("freechess.org", 5000), SessionConfig::default()).await?;
//! let login = session.login(None).await?;
//! println!("Logged in as {}", login.username);
//!
//! let mut observation = session.observe(47);
//! while let Some(event) = observation.next_event().await {
//!     println!("{:?}", event);
//! }
//! println!("Result: {:?}", observation.finish().await?);
//!
//! session.close().await
//! # }
//! ```

pub mod chat;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod login;
pub mod observe;
pub mod queue;
pub mod registry;
pub mod session;

pub use chat::{ChatFeed, LineFeed};
pub use command::{PendingCommand, Reply, Ticket};
pub use config::SessionConfig;
pub use engine::SessionCore;
pub use error::{Result, SessionError};
pub use login::{Credentials, LoginOutcome, LoginState};
pub use observe::{Observation, ObservationEvent};
pub use session::Session;
