//! Command correlation
//!
//! The wire carries no request ids, so a command's response is recognised by
//! grammar alone. A command is a text plus a parser closure that sees every
//! logical line from the moment it is subscribed; the first `Some` the parser
//! returns resolves the caller's [`Reply`] and retires the listener.

use crate::error::{Result, SessionError};
use crate::registry::{Detach, Flow, LineListener, Outbox};
use log::debug;
use protocol::catalog;
use protocol::{
    ChannelEntry, EcoReport, GameSummary, LogicalLine, MovePair, SoughtAd, UserEntry,
};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Pairs a [`Reply`] with the command that resolves it
pub type Ticket = u64;

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// One-shot result of a command
///
/// Resolves with [`SessionError::ConnectionClosed`] if the session goes away
/// before the command completes, and with [`SessionError::Cancelled`] if the
/// command is cancelled first.
#[must_use = "a reply does nothing unless awaited"]
pub struct Reply<T> {
    rx: oneshot::Receiver<Result<T>>,
    ticket: Ticket,
}

impl<T> Reply<T> {
    pub(crate) fn channel() -> (oneshot::Sender<Result<T>>, Self) {
        let (tx, rx) = oneshot::channel();
        let ticket = NEXT_TICKET.fetch_add(1, Ordering::Relaxed);
        (tx, Self { rx, ticket })
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl<T> Future for Reply<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(SessionError::ConnectionClosed)))
    }
}

/// A command that has not been written yet, with the listener that will
/// recognise its response
pub struct PendingCommand {
    text: String,
    blocking: bool,
    ticket: Ticket,
    listener: Box<dyn LineListener>,
}

impl PendingCommand {
    pub fn new(text: impl Into<String>, ticket: Ticket, listener: Box<dyn LineListener>) -> Self {
        Self {
            text: text.into(),
            blocking: false,
            ticket,
            listener,
        }
    }

    /// Marks the command as one whose response cannot be told apart from
    /// another blocking command's
    #[must_use]
    pub fn blocking(mut self) -> Self {
        self.blocking = true;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    pub fn into_parts(self) -> (String, Box<dyn LineListener>) {
        (self.text, self.listener)
    }

    /// Fails the caller without ever writing the command
    pub fn fail(mut self, reason: Detach) {
        self.listener.on_detach(reason);
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("text", &self.text)
            .field("blocking", &self.blocking)
            .field("ticket", &self.ticket)
            .finish()
    }
}

struct Correlation<T, F> {
    parse: F,
    reply: Option<oneshot::Sender<Result<T>>>,
}

impl<T, F> LineListener for Correlation<T, F>
where
    T: Send + 'static,
    F: FnMut(&LogicalLine) -> Option<T> + Send + 'static,
{
    fn on_line(&mut self, line: &LogicalLine, _outbox: &mut Outbox) -> Flow {
        let Some(reply) = self.reply.as_ref() else {
            return Flow::Done;
        };
        if reply.is_closed() {
            debug!("Reply dropped, retiring command listener");
            return Flow::Done;
        }

        match (self.parse)(line) {
            Some(result) => {
                if let Some(reply) = self.reply.take() {
                    let _ = reply.send(Ok(result));
                }
                Flow::Done
            }
            None => Flow::Continue,
        }
    }

    fn on_detach(&mut self, reason: Detach) {
        if let Some(reply) = self.reply.take() {
            let _ = reply.send(Err(reason.into()));
        }
    }
}

/// Builds a command whose reply is the first `Some` returned by `parse`
pub fn command<T, F>(text: impl Into<String>, parse: F) -> (PendingCommand, Reply<T>)
where
    T: Send + 'static,
    F: FnMut(&LogicalLine) -> Option<T> + Send + 'static,
{
    let (tx, reply) = Reply::channel();
    let listener = Correlation {
        parse,
        reply: Some(tx),
    };

    let pending = PendingCommand::new(text, reply.ticket(), Box::new(listener));
    (pending, reply)
}

/// A command with no grammar of interest: done at the next idle prompt
pub fn until_prompt(text: impl Into<String>) -> (PendingCommand, Reply<()>) {
    command(text, |line| line.is_idle_prompt().then_some(()))
}

/// Collects rows until the listing's closing line
fn listing<R, E, C>(text: impl Into<String>, extract: E, complete: C) -> (PendingCommand, Reply<Vec<R>>)
where
    R: Send + 'static,
    E: Fn(&str) -> Vec<R> + Send + 'static,
    C: Fn(&str) -> bool + Send + 'static,
{
    let mut rows = Vec::new();

    let (pending, reply) = command(text, move |line| {
        if complete(line.text()) {
            return Some(std::mem::take(&mut rows));
        }
        rows.extend(extract(line.text()));
        None
    });

    (pending.blocking(), reply)
}

// ---------------------------------------------------------------------------
// Blocking commands

pub fn games() -> (PendingCommand, Reply<Vec<GameSummary>>) {
    listing(
        "games",
        |line| catalog::game_summary(line).into_iter().collect(),
        catalog::games_complete,
    )
}

pub fn who() -> (PendingCommand, Reply<Vec<UserEntry>>) {
    listing("who", catalog::user_entries, catalog::who_complete)
}

pub fn sought() -> (PendingCommand, Reply<Vec<SoughtAd>>) {
    listing(
        "sought",
        |line| catalog::sought_ad(line).into_iter().collect(),
        catalog::sought_complete,
    )
}

pub fn moves(game: u32) -> (PendingCommand, Reply<Vec<MovePair>>) {
    listing(
        format!("moves {game}"),
        |line| catalog::move_pair(line).into_iter().collect(),
        catalog::moves_complete,
    )
}

/// Resolves once the long opening name has been seen
pub fn eco(game: u32) -> (PendingCommand, Reply<EcoReport>) {
    let mut report = EcoReport::default();

    let (pending, reply) = command(format!("eco {game}"), move |line| {
        for (kind, entry) in catalog::eco_entries(line.text()) {
            report.set(kind, entry);
        }
        report.long.is_some().then(|| std::mem::take(&mut report))
    });

    (pending.blocking(), reply)
}

// ---------------------------------------------------------------------------
// Commands acknowledged by a unique line

pub fn channels() -> (PendingCommand, Reply<Vec<ChannelEntry>>) {
    let mut expected: Option<usize> = None;
    let mut entries = Vec::new();

    command("=channel", move |line| {
        let text = line.text();

        if let Some(count) = catalog::channel_list_header(text) {
            expected = Some(count);
        } else if expected.is_some() {
            if let Some(found) = catalog::channel_list(text) {
                entries.extend(found);
            } else if line.is_idle_prompt() {
                return Some(std::mem::take(&mut entries));
            }
        }

        match expected {
            Some(count) if entries.len() >= count => Some(std::mem::take(&mut entries)),
            _ => None,
        }
    })
}

pub fn join_channel(channel: u32) -> (PendingCommand, Reply<bool>) {
    let joined = catalog::channel_joined(channel);
    command(format!("+channel {channel}"), move |line| joined(line.text()))
}

pub fn leave_channel(channel: u32) -> (PendingCommand, Reply<bool>) {
    let left = catalog::channel_left(channel);
    command(format!("-channel {channel}"), move |line| left(line.text()))
}

/// Tell a user handle or a channel number
pub fn tell(recipient: &str, message: &str) -> (PendingCommand, Reply<bool>) {
    let told = catalog::tell_ack(recipient);
    command(format!("tell {recipient} {message}"), move |line| told(line.text()))
}

pub fn shout(message: &str) -> (PendingCommand, Reply<bool>) {
    command(format!("shout {message}"), |line| catalog::shout_ack(line.text()))
}

pub fn it(message: &str) -> (PendingCommand, Reply<bool>) {
    command(format!("it {message}"), |line| catalog::shout_ack(line.text()))
}

pub fn kibitz(game: u32, message: &str) -> (PendingCommand, Reply<bool>) {
    command(format!("xkibitz {game} {message}"), |line| {
        catalog::kibitz_ack(line.text())
    })
}

pub fn whisper(game: u32, message: &str) -> (PendingCommand, Reply<bool>) {
    command(format!("xwhisper {game} {message}"), |line| {
        catalog::whisper_ack(line.text())
    })
}

pub fn observers(game: u32) -> (PendingCommand, Reply<Vec<String>>) {
    let listed = catalog::observers(game);
    command(format!("allobservers {game}"), move |line| listed(line.text()))
}

/// `Ok(false)` when the game was not being observed
pub fn unobserve(game: u32) -> (PendingCommand, Reply<bool>) {
    let removed = catalog::unobserve_ack(game);
    command(format!("unobserve {game}"), move |line| removed(line.text()))
}
