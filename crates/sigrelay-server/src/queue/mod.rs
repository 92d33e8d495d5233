//! In-memory message queue shared by all relay callers.
//!
//! An unbounded FIFO of opaque text payloads. Producers never wait; consumers
//! pop one message at a time and can await a push notification instead of
//! sleeping blindly.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tokio::sync::futures::Notified;

/// Thread-safe unbounded FIFO of relayed messages.
#[derive(Debug, Default)]
pub struct MessageQueue {
    messages: Mutex<VecDeque<String>>,
    pushed: Notify,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message to the tail and wake one waiting consumer.
    pub fn push(&self, message: String) {
        self.lock().push_back(message);
        self.pushed.notify_one();
    }

    /// Remove and return the oldest message, if any.
    pub fn pop(&self) -> Option<String> {
        self.lock().pop_front()
    }

    /// Resolves once a message has been pushed since the last wakeup.
    ///
    /// A push that happens while nobody is waiting leaves a single permit,
    /// so the next call resolves immediately. Wakeups are hints only: the
    /// queue may already be empty again when the future resolves.
    pub fn notified(&self) -> Notified<'_> {
        self.pushed.notified()
    }

    /// Number of messages currently queued.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave the deque half-updated.
    fn lock(&self) -> MutexGuard<'_, VecDeque<String>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
