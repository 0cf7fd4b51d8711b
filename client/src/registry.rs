//! Subscription registry
//!
//! Every logical line is offered to every active listener in the order the
//! listeners subscribed. Delivery borrows the registry mutably, so the set of
//! listeners cannot change while a line is being delivered: a listener added
//! by a command issued in reaction to line N first sees line N + 1.

use log::debug;
use protocol::LogicalLine;

pub type ListenerId = u64;

/// What a listener wants after seeing a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// Unsubscribe this listener; others still receive the line
    Done,
}

/// Why a listener was removed from outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detach {
    Cancelled,
    Closed,
}

/// Interest in the logical line stream
pub trait LineListener: Send {
    fn on_line(&mut self, line: &LogicalLine, outbox: &mut Outbox) -> Flow;

    /// Called exactly once when the listener is removed without finishing
    fn on_detach(&mut self, _reason: Detach) {}
}

/// Effects produced by listeners during delivery
#[derive(Debug, Default)]
pub struct Outbox {
    writes: Vec<String>,
    keepalive: bool,
}

impl Outbox {
    /// Queues a command for the transport, in order
    pub fn send(&mut self, command: impl Into<String>) {
        self.writes.push(command.into());
    }

    pub fn arm_keepalive(&mut self) {
        self.keepalive = true;
    }

    pub fn take_writes(&mut self) -> Vec<String> {
        std::mem::take(&mut self.writes)
    }

    pub fn take_keepalive(&mut self) -> bool {
        std::mem::take(&mut self.keepalive)
    }

    #[cfg(test)]
    pub(crate) fn writes(&self) -> &[String] {
        &self.writes
    }
}

#[derive(Default)]
pub struct Registry {
    next_id: ListenerId,
    listeners: Vec<(ListenerId, Box<dyn LineListener>)>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: Box<dyn LineListener>) -> ListenerId {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.push((id, listener));
        debug!("Listener {} subscribed ({} active)", id, self.listeners.len());
        id
    }

    /// Removes a listener; returns false if it was already gone
    pub fn unsubscribe(&mut self, id: ListenerId, reason: Detach) -> bool {
        let Some(index) = self.listeners.iter().position(|(lid, _)| *lid == id) else {
            return false;
        };

        let (_, mut listener) = self.listeners.remove(index);
        listener.on_detach(reason);
        debug!("Listener {} detached: {:?}", id, reason);
        true
    }

    /// Offers one line to every listener and returns the ones that finished
    pub fn deliver(&mut self, line: &LogicalLine, outbox: &mut Outbox) -> Vec<ListenerId> {
        let mut finished = Vec::new();

        self.listeners
            .retain_mut(|(id, listener)| match listener.on_line(line, outbox) {
                Flow::Continue => true,
                Flow::Done => {
                    finished.push(*id);
                    false
                }
            });

        finished
    }

    /// Detaches everyone with [`Detach::Closed`]
    pub fn close_all(&mut self) {
        for (id, mut listener) in self.listeners.drain(..) {
            listener.on_detach(Detach::Closed);
            debug!("Listener {} closed", id);
        }
    }

    #[cfg(test)]
    fn contains(&self, id: ListenerId) -> bool {
        self.listeners.iter().any(|(lid, _)| *lid == id)
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}
