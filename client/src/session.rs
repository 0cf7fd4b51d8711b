//! Async session handle and the transport loop behind it
//!
//! The handle never touches the transport. Every operation is turned into a
//! [`SessionMessage`] for the loop, which is the only reader and the only
//! writer of the connection. The loop prefers control messages over reads so
//! that a listener is always subscribed before the response to its command
//! can be read.

use crate::chat::{chat_feed, line_feed, ChatFeed, LineFeed};
use crate::command::{self, PendingCommand, Reply, Ticket};
use crate::config::SessionConfig;
use crate::engine::SessionCore;
use crate::error::{Result, SessionError};
use crate::login::{Credentials, LoginListener, LoginOutcome};
use crate::observe::{watch, Observation};
use crate::registry::LineListener;
use log::{debug, error, info, warn};
use protocol::{
    encode_command, ChannelEntry, EcoReport, GameSummary, MovePair, SoughtAd, UserEntry,
};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant, Interval, MissedTickBehavior};

/// Requests from the handle to the transport loop
pub enum SessionMessage {
    Submit(PendingCommand),
    Subscribe(Box<dyn LineListener>),
    Observe {
        game: u32,
        listener: Box<dyn LineListener>,
    },
    Unobserve {
        game: u32,
        command: PendingCommand,
    },
    Cancel(Ticket),
    Close,
}

/// A live session with the chess server
pub struct Session {
    tx: mpsc::UnboundedSender<SessionMessage>,
    config: SessionConfig,
    task: JoinHandle<Result<()>>,
}

impl Session {
    /// Runs a session over an already connected transport
    pub fn start<T>(transport: T, config: SessionConfig) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = SessionCore::new(&config);
        let task = tokio::spawn(run_transport(transport, core, rx, config.clone()));

        Self { tx, config, task }
    }

    pub async fn connect(addr: impl ToSocketAddrs, config: SessionConfig) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        info!("Connected to {}", stream.peer_addr()?);

        Ok(Self::start(stream, config))
    }

    fn post(&self, message: SessionMessage) {
        // A closed channel drops the message, which fails its reply
        if self.tx.send(message).is_err() {
            debug!("Session loop has ended, dropping request");
        }
    }

    fn submit<T>(&self, (pending, reply): (PendingCommand, Reply<T>)) -> Reply<T> {
        self.post(SessionMessage::Submit(pending));
        reply
    }

    /// Logs in, as a guest when no credentials are given
    pub fn login(&self, credentials: Option<Credentials>) -> Reply<LoginOutcome> {
        let (listener, reply) = LoginListener::new(
            self.config.catalog(),
            credentials,
            self.config.setup_commands.clone(),
        );
        self.post(SessionMessage::Subscribe(Box::new(listener)));
        reply
    }

    pub fn games(&self) -> Reply<Vec<GameSummary>> {
        self.submit(command::games())
    }

    pub fn who(&self) -> Reply<Vec<UserEntry>> {
        self.submit(command::who())
    }

    pub fn sought(&self) -> Reply<Vec<SoughtAd>> {
        self.submit(command::sought())
    }

    pub fn moves(&self, game: u32) -> Reply<Vec<MovePair>> {
        self.submit(command::moves(game))
    }

    pub fn eco(&self, game: u32) -> Reply<EcoReport> {
        self.submit(command::eco(game))
    }

    pub fn channels(&self) -> Reply<Vec<ChannelEntry>> {
        self.submit(command::channels())
    }

    pub fn join_channel(&self, channel: u32) -> Reply<bool> {
        self.submit(command::join_channel(channel))
    }

    pub fn leave_channel(&self, channel: u32) -> Reply<bool> {
        self.submit(command::leave_channel(channel))
    }

    pub fn tell(&self, recipient: &str, message: &str) -> Reply<bool> {
        self.submit(command::tell(recipient, message))
    }

    pub fn shout(&self, message: &str) -> Reply<bool> {
        self.submit(command::shout(message))
    }

    pub fn it(&self, message: &str) -> Reply<bool> {
        self.submit(command::it(message))
    }

    pub fn kibitz(&self, game: u32, message: &str) -> Reply<bool> {
        self.submit(command::kibitz(game, message))
    }

    pub fn whisper(&self, game: u32, message: &str) -> Reply<bool> {
        self.submit(command::whisper(game, message))
    }

    pub fn observers(&self, game: u32) -> Reply<Vec<String>> {
        self.submit(command::observers(game))
    }

    pub fn observe(&self, game: u32) -> Observation {
        let (listener, observation) = watch(game);
        self.post(SessionMessage::Observe {
            game,
            listener: Box::new(listener),
        });
        observation
    }

    /// Ends the local watch first, then tells the server
    pub fn unobserve(&self, game: u32) -> Reply<bool> {
        let (command, reply) = command::unobserve(game);
        self.post(SessionMessage::Unobserve { game, command });
        reply
    }

    /// Sends any command and waits for the next idle prompt
    pub fn send(&self, text: &str) -> Reply<()> {
        self.submit(command::until_prompt(text))
    }

    /// Withdraws a command that has not completed yet
    ///
    /// A queued command is never written; a written one stops listening. The
    /// reply then resolves with [`SessionError::Cancelled`]. Login and
    /// observation replies are not commands and are left alone.
    pub fn cancel<T>(&self, reply: &Reply<T>) {
        self.post(SessionMessage::Cancel(reply.ticket()));
    }

    /// Waits up to `limit` for a reply, cancelling its command on expiry
    pub async fn with_timeout<T>(&self, mut reply: Reply<T>, limit: Duration) -> Result<T> {
        match timeout(limit, &mut reply).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Command timed out after {:?}", limit);
                self.cancel(&reply);
                Err(SessionError::Cancelled)
            }
        }
    }

    pub fn chat(&self) -> ChatFeed {
        let (listener, feed) = chat_feed();
        self.post(SessionMessage::Subscribe(listener));
        feed
    }

    pub fn lines(&self) -> LineFeed {
        let (listener, feed) = line_feed();
        self.post(SessionMessage::Subscribe(listener));
        feed
    }

    /// Stops the transport loop, failing whatever is still pending
    pub async fn close(self) -> Result<()> {
        self.post(SessionMessage::Close);

        match self.task.await {
            Ok(result) => result,
            Err(e) => {
                error!("Session task failed: {}", e);
                Ok(())
            }
        }
    }
}

fn apply(core: &mut SessionCore, message: SessionMessage) {
    match message {
        SessionMessage::Submit(command) => {
            core.submit(command);
        }
        SessionMessage::Subscribe(listener) => {
            core.subscribe(listener);
        }
        SessionMessage::Observe { game, listener } => {
            core.observe(game, listener);
        }
        SessionMessage::Unobserve { game, command } => {
            core.cancel_watch(game);
            core.submit(command);
        }
        SessionMessage::Cancel(ticket) => {
            if !core.cancel(ticket) {
                debug!("Nothing to cancel for ticket {}", ticket);
            }
        }
        SessionMessage::Close => {}
    }
}

async fn flush<T>(transport: &mut T, core: &mut SessionCore) -> std::io::Result<()>
where
    T: AsyncWrite + Unpin,
{
    let writes = core.take_writes();
    if writes.is_empty() {
        return Ok(());
    }

    for command in &writes {
        transport.write_all(encode_command(command).as_bytes()).await?;
    }
    transport.flush().await
}

async fn keepalive_tick(keepalive: &mut Option<Interval>) {
    match keepalive {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Owns the transport and the core until the session ends
async fn run_transport<T>(
    mut transport: T,
    mut core: SessionCore,
    mut messages: mpsc::UnboundedReceiver<SessionMessage>,
    config: SessionConfig,
) -> Result<()>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; config.read_buffer_size.max(1)];
    let mut keepalive: Option<Interval> = None;

    let outcome = loop {
        if let Err(e) = flush(&mut transport, &mut core).await {
            error!("Failed to write to server: {}", e);
            break Err(e.into());
        }

        if keepalive.is_none() && core.take_keepalive_request() {
            let period = config.keepalive_interval;
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("Keepalive armed every {:?}", period);
            keepalive = Some(timer);
        }

        tokio::select! {
            biased;

            message = messages.recv() => match message {
                Some(SessionMessage::Close) | None => {
                    info!("Session closed by client");
                    break Ok(());
                }
                Some(message) => apply(&mut core, message),
            },

            read = transport.read(&mut buffer) => match read {
                Ok(0) => {
                    warn!("Server closed the connection");
                    break Ok(());
                }
                Ok(n) => core.feed(&buffer[..n]),
                Err(e) => {
                    error!("Failed to read from server: {}", e);
                    break Err(e.into());
                }
            },

            _ = keepalive_tick(&mut keepalive) => {
                debug!("Sending keepalive");
                core.send(config.keepalive_command.clone());
            },
        }
    };

    core.close();
    if let Err(e) = transport.shutdown().await {
        debug!("Transport shutdown failed: {}", e);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[tokio::test]
    async fn test_command_is_written_with_crlf() {
        let mock = Builder::new()
            .write(b"games\r\n")
            .read(b"2 games displayed.\n")
            .build();
        let session = Session::start(mock, SessionConfig::default());

        let games = session.games().await.unwrap();

        assert!(games.is_empty());
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_eof_fails_pending_commands() {
        let mock = Builder::new().write(b"who\r\n").build();
        let session = Session::start(mock, SessionConfig::default());

        let reply = session.who();

        assert!(matches!(reply.await, Err(SessionError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_read_error_is_reported_on_close() {
        let mock = Builder::new()
            .read_error(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset"))
            .build();
        let session = Session::start(mock, SessionConfig::default());
        let mut feed = session.lines();

        assert!(feed.next().await.is_none());
        assert!(matches!(session.close().await, Err(SessionError::Io(_))));
    }

    #[tokio::test]
    async fn test_close_fails_pending_commands() {
        let mock = Builder::new().write(b"shout late\r\n").build();
        let session = Session::start(mock, SessionConfig::default());
        let shout = session.shout("late");

        session.close().await.unwrap();

        assert!(matches!(shout.await, Err(SessionError::ConnectionClosed)));
    }
}
