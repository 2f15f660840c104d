// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::activity::ActivityKind;
use crate::id::{IssueId, TenantId};

fn activity_event(n: u64) -> BusEvent {
    BusEvent::ActivityAppended {
        tenant_id: TenantId(1),
        issue_id: Some(IssueId(1)),
        kind: ActivityKind::ActionNote,
        epoch_ms: n,
    }
}

#[tokio::test]
async fn subscribers_receive_in_publication_order() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    bus.publish(activity_event(1));
    bus.publish(activity_event(2));

    assert_eq!(rx.recv().await.unwrap().epoch_ms(), 1);
    assert_eq!(rx.recv().await.unwrap().epoch_ms(), 2);
}

#[tokio::test]
async fn publish_without_subscribers_is_silent() {
    let bus = EventBus::new();
    assert_eq!(bus.subscriber_count(), 0);
    // Must not panic or block.
    bus.publish(activity_event(1));
}

#[tokio::test]
async fn subscriptions_start_at_the_tail() {
    let bus = EventBus::new();
    bus.publish(activity_event(1));

    let mut rx = bus.subscribe();
    bus.publish(activity_event(2));

    // The pre-subscription event is not delivered.
    assert_eq!(rx.recv().await.unwrap().epoch_ms(), 2);
}

#[tokio::test]
async fn slow_consumers_drop_from_the_oldest_end() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();

    // Overflow the per-subscriber buffer without consuming.
    for n in 0..(BUS_CAPACITY as u64 + 10) {
        bus.publish(activity_event(n));
    }

    // First recv reports the lag, subsequent recvs resume at the oldest
    // retained event.
    let lagged = rx.recv().await;
    assert!(matches!(
        lagged,
        Err(tokio::sync::broadcast::error::RecvError::Lagged(10))
    ));
    assert_eq!(rx.recv().await.unwrap().epoch_ms(), 10);
}

#[tokio::test]
async fn clones_share_one_channel() {
    let bus = EventBus::new();
    let mut rx = bus.subscribe();
    let clone = bus.clone();

    clone.publish(activity_event(5));
    assert_eq!(rx.recv().await.unwrap().epoch_ms(), 5);
}
