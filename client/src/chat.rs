//! Open-ended feeds: chat messages and the raw line stream
//!
//! Feeds never complete on their own. Dropping one retires its listener at
//! the next line; closing the session ends it with `None`.

use crate::registry::{Flow, LineListener, Outbox};
use protocol::catalog::chat_message;
use protocol::{ChatMessage, LogicalLine};
use tokio::sync::mpsc;

/// Forwards whatever `select` picks out of each line
struct Forward<T, F> {
    select: F,
    tx: mpsc::UnboundedSender<T>,
}

impl<T, F> LineListener for Forward<T, F>
where
    T: Send + 'static,
    F: FnMut(&LogicalLine) -> Option<T> + Send + 'static,
{
    fn on_line(&mut self, line: &LogicalLine, _outbox: &mut Outbox) -> Flow {
        if self.tx.is_closed() {
            return Flow::Done;
        }

        if let Some(item) = (self.select)(line) {
            if self.tx.send(item).is_err() {
                return Flow::Done;
            }
        }

        Flow::Continue
    }
}

pub struct ChatFeed {
    rx: mpsc::UnboundedReceiver<ChatMessage>,
}

impl ChatFeed {
    pub async fn next(&mut self) -> Option<ChatMessage> {
        self.rx.recv().await
    }
}

pub struct LineFeed {
    rx: mpsc::UnboundedReceiver<LogicalLine>,
}

impl LineFeed {
    pub async fn next(&mut self) -> Option<LogicalLine> {
        self.rx.recv().await
    }
}

/// Shouts, `it` messages, personal and channel tells
pub fn chat_feed() -> (Box<dyn LineListener>, ChatFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    let select = |line: &LogicalLine| chat_message(line.text());

    (Box::new(Forward { select, tx }), ChatFeed { rx })
}

/// Every logical line, idle prompts included
pub fn line_feed() -> (Box<dyn LineListener>, LineFeed) {
    let (tx, rx) = mpsc::unbounded_channel();
    let select = |line: &LogicalLine| Some(line.clone());

    (Box::new(Forward { select, tx }), LineFeed { rx })
}
