// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use ralph_core::{EventBus, Issue, IssuePatch, IssueState};

use crate::store::TenantConfig;

fn setup() -> (Store, Issue) {
    let store = Store::open_in_memory(EventBus::new()).unwrap();
    let tenant = store
        .upsert_tenant(&TenantConfig {
            name: "acme".to_string(),
            forge_repo: "acme/storefront".to_string(),
            base_branch: "main".to_string(),
            branch_prefix: "ralph/".to_string(),
            label_filter: None,
            trusted_reviewer: None,
            approval_marker: "@autoralph approved".to_string(),
            max_iterations: 10,
            tracker_token: String::new(),
            forge_token: String::new(),
        })
        .unwrap();
    let (issue, _) = store
        .create_issue_if_absent(tenant.id, "ext-1", "ABC-1", "Add login", "")
        .unwrap();
    (store, issue)
}

fn to_building(store: &Store, issue: &Issue) {
    store
        .transition(issue.id, IssueState::Queued, IssueState::Refining, IssuePatch::default(), "")
        .unwrap();
    store
        .transition(
            issue.id,
            IssueState::Refining,
            IssueState::Approved,
            IssuePatch::default().set_approved_plan("plan"),
            "",
        )
        .unwrap();
    store
        .transition(
            issue.id,
            IssueState::Approved,
            IssueState::Building,
            IssuePatch::default().set_build_active(true),
            "",
        )
        .unwrap();
}

#[test]
fn activity_pagination_pages_newest_first() {
    let (store, issue) = setup();
    for n in 0..5 {
        store
            .append_activity(
                issue.tenant_id,
                Some(issue.id),
                ActivityKind::ActionNote,
                &format!("note {}", n),
            )
            .unwrap();
    }

    let page1 = store.list_activity(issue.id, None, 2).unwrap();
    assert_eq!(page1.len(), 2);
    assert_eq!(page1[0].detail, "note 4");
    assert_eq!(page1[1].detail, "note 3");

    let page2 = store.list_activity(issue.id, Some(page1[1].id), 2).unwrap();
    assert_eq!(page2[0].detail, "note 2");
    assert_eq!(page2[1].detail, "note 1");
}

#[test]
fn activity_timestamps_are_non_decreasing() {
    let (store, issue) = setup();
    for n in 0..4 {
        store
            .append_activity(
                issue.tenant_id,
                Some(issue.id),
                ActivityKind::ActionNote,
                &format!("note {}", n),
            )
            .unwrap();
    }
    let entries = store.list_activity(issue.id, None, 10).unwrap();
    // Newest-first listing: timestamps never increase down the page.
    for pair in entries.windows(2) {
        assert!(pair[0].created_at_ms >= pair[1].created_at_ms);
        assert!(pair[0].id > pair[1].id);
    }
}

#[test]
fn tenant_level_activity_has_no_issue() {
    let (store, issue) = setup();
    store
        .append_activity(
            issue.tenant_id,
            None,
            ActivityKind::GatewayError,
            "tracker poll failed: timeout",
        )
        .unwrap();

    // Not attributed to the issue, but visible on the tenant feed.
    assert_eq!(store.count_activity(issue.id).unwrap(), 0);
    let feed = store.list_tenant_activity(issue.tenant_id, None, 10).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].issue_id, None);
    assert_eq!(feed[0].kind, ActivityKind::GatewayError);
}

#[test]
fn tenant_feed_interleaves_issue_entries() {
    let (store, issue) = setup();
    store
        .append_activity(issue.tenant_id, Some(issue.id), ActivityKind::ActionNote, "a")
        .unwrap();
    store
        .append_activity(issue.tenant_id, None, ActivityKind::GatewayError, "b")
        .unwrap();

    let feed = store.list_tenant_activity(issue.tenant_id, None, 10).unwrap();
    assert_eq!(feed.len(), 2);
    assert_eq!(feed[0].detail, "b");
    assert_eq!(feed[1].issue_id, Some(issue.id));
}

#[test]
fn build_events_require_a_build_state() {
    let (store, issue) = setup();

    let err = store
        .append_build_event(issue.id, &BuildPayload::LogMessage { message: "hi".into() })
        .unwrap_err();
    assert!(matches!(err, StoreError::NotBuilding { .. }));

    to_building(&store, &issue);
    store
        .append_build_event(issue.id, &BuildPayload::LogMessage { message: "hi".into() })
        .unwrap();
}

#[test]
fn build_events_replay_in_order() {
    let (store, issue) = setup();
    to_building(&store, &issue);

    for n in 1..=3 {
        store
            .append_build_event(issue.id, &BuildPayload::IterationStart { iteration: n })
            .unwrap();
    }

    let events = store.list_build_events(issue.id, None, 10).unwrap();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].payload, BuildPayload::IterationStart { iteration: 1 });
    assert_eq!(events[2].payload, BuildPayload::IterationStart { iteration: 3 });

    // Tail replay from a cursor.
    let tail = store.list_build_events(issue.id, Some(events[0].id), 10).unwrap();
    assert_eq!(tail.len(), 2);
}

#[test]
fn build_event_publishes_on_bus() {
    let (store, issue) = setup();
    to_building(&store, &issue);
    let mut rx = store.bus().subscribe();

    store
        .append_build_event(issue.id, &BuildPayload::QaPhase { phase: "lint".into() })
        .unwrap();

    let event = rx.try_recv().unwrap();
    assert!(matches!(event, ralph_core::BusEvent::BuildEvent { issue_id, .. } if issue_id == issue.id));
}
