//! In-memory publish/subscribe adapter.
//!
//! Bounded per-subscriber queues with try-send delivery: a full queue
//! drops the event for that subscriber, a disconnected receiver drops the
//! subscription. Matches the at-most-once, no-backpressure contract of
//! [`EventPort`].

use crate::ports::event_port::{EngineEvent, EventPort};
use std::sync::Mutex;
use std::sync::mpsc::{Receiver, SyncSender, TrySendError, sync_channel};

const SUBSCRIBER_QUEUE_DEPTH: usize = 64;

#[derive(Default)]
pub struct MemoryBusAdapter {
    subscribers: Mutex<Vec<SyncSender<EngineEvent>>>,
}

impl MemoryBusAdapter {
    pub fn new() -> Self {
        MemoryBusAdapter::default()
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        let (tx, rx) = sync_channel(SUBSCRIBER_QUEUE_DEPTH);
        self.lock_subscribers().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<SyncSender<EngineEvent>>> {
        match self.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl EventPort for MemoryBusAdapter {
    fn publish(&self, event: &EngineEvent) {
        self.lock_subscribers().retain(|tx| {
            match tx.try_send(event.clone()) {
                Ok(()) => true,
                // slow subscriber misses this event but stays subscribed
                Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            }
        });
    }
}
