// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process publish/subscribe fan-out.
//!
//! Delivery is best-effort within the process: each subscriber has a
//! bounded queue and slow consumers lose events from the oldest end.
//! Publication is enqueue-only and never blocks the writer.

use crate::event::BusEvent;
use tokio::sync::broadcast;

/// Per-subscriber buffer size. A lagging subscriber is skipped forward,
/// dropping the oldest events.
pub const BUS_CAPACITY: usize = 64;

/// Subscription handle. `recv()` yields events in publication order;
/// a `Lagged` error reports how many were dropped.
pub type BusReceiver = broadcast::Receiver<BusEvent>;

/// Process-wide event bus. Cheap to clone; all clones share one channel.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Never blocks and never fails: with no subscribers the event is
    /// simply dropped (the store remains the system-of-record).
    pub fn publish(&self, event: BusEvent) {
        let _ = self.tx.send(event);
    }

    /// Open a new subscription starting at the current tail.
    pub fn subscribe(&self) -> BusReceiver {
        self.tx.subscribe()
    }

    /// Number of live subscribers (used by shutdown logging).
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
