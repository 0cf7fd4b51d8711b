use crate::registry::ListenerId;
use std::collections::VecDeque;

/// FIFO of commands that must not overlap
///
/// At most one item is active. The owner starts whatever `enqueue` or
/// `complete` hands back, then reports the id it got with `started`.
#[derive(Debug)]
pub struct SerialQueue<T> {
    waiting: VecDeque<T>,
    running: bool,
    active: Option<ListenerId>,
}

impl<T> Default for SerialQueue<T> {
    fn default() -> Self {
        Self {
            waiting: VecDeque::new(),
            running: false,
            active: None,
        }
    }
}

impl<T> SerialQueue<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the item back when it may run immediately
    pub fn enqueue(&mut self, item: T) -> Option<T> {
        if self.running {
            self.waiting.push_back(item);
            return None;
        }

        self.running = true;
        Some(item)
    }

    pub fn started(&mut self, id: ListenerId) {
        self.active = Some(id);
    }

    /// Completes the active item and hands out the next one, if any
    ///
    /// Ids other than the active one are ignored.
    pub fn complete(&mut self, id: ListenerId) -> Option<T> {
        if self.active != Some(id) {
            return None;
        }
        self.active = None;

        let next = self.waiting.pop_front();
        self.running = next.is_some();
        next
    }

    /// Takes the first waiting item that matches, leaving the rest in order
    pub fn remove(&mut self, matches: impl Fn(&T) -> bool) -> Option<T> {
        let index = self.waiting.iter().position(matches)?;
        self.waiting.remove(index)
    }

    /// Empties the queue, returning the items that never ran
    pub fn drain(&mut self) -> Vec<T> {
        self.running = false;
        self.active = None;
        self.waiting.drain(..).collect()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    #[cfg(test)]
    fn active(&self) -> Option<ListenerId> {
        self.active
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        !self.running
    }
}
