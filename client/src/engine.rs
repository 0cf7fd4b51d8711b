//! Synchronous session core
//!
//! Owns every piece of protocol state: the demultiplexer, the listeners, the
//! blocking command queue and the observation watches. It performs no IO;
//! the transport loop feeds it bytes and collects the writes it produces.

use crate::command::{PendingCommand, Ticket};
use crate::config::SessionConfig;
use crate::queue::SerialQueue;
use crate::registry::{Detach, LineListener, ListenerId, Outbox, Registry};
use log::{debug, info};
use protocol::LineDemultiplexer;
use std::collections::HashMap;

pub struct SessionCore {
    demux: LineDemultiplexer,
    registry: Registry,
    queue: SerialQueue<PendingCommand>,
    watches: HashMap<u32, Vec<ListenerId>>,
    tickets: HashMap<Ticket, ListenerId>,
    outbox: Outbox,
    closed: bool,
}

impl SessionCore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            demux: LineDemultiplexer::new(config.prompt.clone()),
            registry: Registry::new(),
            queue: SerialQueue::new(),
            watches: HashMap::new(),
            tickets: HashMap::new(),
            outbox: Outbox::default(),
            closed: false,
        }
    }

    /// Processes one chunk of transport data, line by line
    pub fn feed(&mut self, bytes: &[u8]) {
        for line in self.demux.feed(bytes) {
            let finished = self.registry.deliver(&line, &mut self.outbox);
            for id in finished {
                self.retire(id);
            }
        }
    }

    /// Routes a command through the queue when it is blocking
    pub fn submit(&mut self, command: PendingCommand) -> Option<ListenerId> {
        if command.is_blocking() {
            self.enqueue(command)
        } else {
            self.issue(command)
        }
    }

    /// Subscribes the command's listener, then writes the command
    pub fn issue(&mut self, command: PendingCommand) -> Option<ListenerId> {
        if self.closed {
            command.fail(Detach::Closed);
            return None;
        }

        let ticket = command.ticket();
        let (text, listener) = command.into_parts();
        let id = self.registry.subscribe(listener);
        self.tickets.insert(ticket, id);
        debug!("Issuing {:?} as listener {}", text, id);
        self.outbox.send(text);
        Some(id)
    }

    /// Runs the command now if no blocking command is active, else queues it
    pub fn enqueue(&mut self, command: PendingCommand) -> Option<ListenerId> {
        if self.closed {
            command.fail(Detach::Closed);
            return None;
        }

        let now = self.queue.enqueue(command)?;
        self.start(now)
    }

    fn start(&mut self, command: PendingCommand) -> Option<ListenerId> {
        let id = self.issue(command)?;
        self.queue.started(id);
        Some(id)
    }

    /// Subscribes a listener that issues no command of its own
    pub fn subscribe(&mut self, listener: Box<dyn LineListener>) -> Option<ListenerId> {
        if self.closed {
            let mut listener = listener;
            listener.on_detach(Detach::Closed);
            return None;
        }

        Some(self.registry.subscribe(listener))
    }

    /// Starts watching a game and asks the server to send it
    pub fn observe(&mut self, game: u32, listener: Box<dyn LineListener>) -> Option<ListenerId> {
        let id = self.subscribe(listener)?;
        self.watches.entry(game).or_default().push(id);
        self.outbox.send(format!("observe {game}"));
        Some(id)
    }

    /// Ends every local watch of a game; returns how many there were
    pub fn cancel_watch(&mut self, game: u32) -> usize {
        let ids = self.watches.remove(&game).unwrap_or_default();

        ids.into_iter()
            .filter(|id| self.registry.unsubscribe(*id, Detach::Cancelled))
            .count()
    }

    /// Withdraws a queued command or detaches a written one, failing its
    /// reply with `Cancelled`; returns false once the command has finished
    pub fn cancel(&mut self, ticket: Ticket) -> bool {
        if let Some(command) = self.queue.remove(|queued| queued.ticket() == ticket) {
            debug!("Withdrawing queued {:?}", command.text());
            command.fail(Detach::Cancelled);
            return true;
        }

        let Some(id) = self.tickets.remove(&ticket) else {
            return false;
        };
        if !self.registry.unsubscribe(id, Detach::Cancelled) {
            return false;
        }

        self.retire(id);
        true
    }

    /// Writes a bare command nobody waits on
    pub fn send(&mut self, command: impl Into<String>) {
        if !self.closed {
            self.outbox.send(command);
        }
    }

    fn retire(&mut self, id: ListenerId) {
        self.tickets.retain(|_, issued| *issued != id);
        self.watches.retain(|_, ids| {
            ids.retain(|watched| *watched != id);
            !ids.is_empty()
        });

        if let Some(next) = self.queue.complete(id) {
            debug!("Starting queued {:?}", next.text());
            self.start(next);
        }
    }

    /// Fails every pending command and detaches every listener
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let queued = self.queue.drain();
        info!(
            "Closing session: {} listeners, {} queued commands",
            self.registry.len(),
            queued.len()
        );

        self.registry.close_all();
        for command in queued {
            command.fail(Detach::Closed);
        }

        self.watches.clear();
        self.tickets.clear();
        self.outbox.take_writes();
        self.outbox.take_keepalive();
    }

    pub fn take_writes(&mut self) -> Vec<String> {
        self.outbox.take_writes()
    }

    pub fn take_keepalive_request(&mut self) -> bool {
        self.outbox.take_keepalive()
    }

    pub fn listener_count(&self) -> usize {
        self.registry.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.waiting()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.values().map(Vec::len).sum()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
