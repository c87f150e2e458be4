use crate::event::LogEvent;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Unbounded thread-safe FIFO between producer threads and the delivery worker.
///
/// `enqueue` never blocks beyond the scoped lock and `drain_all` swaps the whole
/// backlog out in one motion, so no lock is ever held across encoding or network I/O.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Mutex<VecDeque<LogEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        EventQueue::default()
    }

    pub fn enqueue(&self, event: LogEvent) {
        self.lock().push_back(event);
    }

    /// Atomically removes and returns everything queued so far, in FIFO order.
    pub fn drain_all(&self) -> VecDeque<LogEvent> {
        std::mem::take(&mut *self.lock())
    }

    /// Puts drained-but-unprocessed events back ahead of anything enqueued since,
    /// preserving overall FIFO order.
    pub fn requeue_front(&self, mut events: VecDeque<LogEvent>) {
        if events.is_empty() {
            return;
        }
        let mut guard = self.lock();
        events.append(&mut guard);
        *guard = events;
    }

    /// Discards all queued events, returning how many were dropped.
    pub fn purge(&self) -> usize {
        let mut guard = self.lock();
        let purged = guard.len();
        guard.clear();
        purged
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEvent>> {
        // A producer panicking mid-push must not wedge delivery for everyone else.
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
