//! One-shot events handed from a component to whoever presents it.
//!
//! Events stay pending until the consumer acknowledges them, so a consumer
//! that re-reads state sees the same event again instead of losing it, and an
//! acknowledged event is never delivered twice.

use std::{
    collections::VecDeque,
    sync::{Mutex, MutexGuard},
};

use tokio::sync::Notify;

pub struct SignalQueue<E> {
    pending: Mutex<VecDeque<E>>,
    notify: Notify,
}

impl<E: Clone> SignalQueue<E> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn raise(&self, event: E) {
        self.pending().push_back(event);
        self.notify.notify_waiters();
    }

    /// The oldest unacknowledged event, left in place.
    pub fn peek(&self) -> Option<E> {
        self.pending().front().cloned()
    }

    /// Marks the oldest event as handled and returns it.
    pub fn acknowledge(&self) -> Option<E> {
        self.pending().pop_front()
    }

    /// Waits until an event is pending and returns it without consuming it.
    pub async fn next(&self) -> E {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(event) = self.peek() {
                return event;
            }

            notified.await;
        }
    }

    fn pending(&self) -> MutexGuard<'_, VecDeque<E>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<E: Clone> Default for SignalQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}
