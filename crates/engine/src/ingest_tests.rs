// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::TestContext;
use ralph_core::{ActivityKind, IssueState, MergeSignal};
use ralph_gateways::{CrStatus, GatewayError, Review, ReviewComment, ReviewVerdict};

#[test]
fn jitter_stays_within_ten_percent() {
    let base = Duration::from_secs(30);
    for _ in 0..100 {
        let j = jittered(base);
        assert!(j >= Duration::from_secs(27));
        assert!(j <= Duration::from_secs(33));
    }
}

#[test]
fn zero_interval_is_left_alone() {
    assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
}

// ---------------------------------------------------------------- tracker

#[tokio::test]
async fn new_items_become_queued_issues() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-1", "ABC-1", "Add login", "email+password");

    ctx.tracker_ingest.cycle().await;

    let issues = ctx.store.list_active_issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].identifier, "ABC-1");
    assert_eq!(issues[0].state, IssueState::Queued);
}

#[tokio::test]
async fn rerunning_on_unchanged_list_creates_nothing() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-1", "ABC-1", "Add login", "");

    ctx.tracker_ingest.cycle().await;
    let issue = &ctx.store.list_active_issues().unwrap()[0];
    let before = ctx.store.count_activity(issue.id).unwrap();

    ctx.tracker_ingest.cycle().await;

    assert_eq!(ctx.store.list_active_issues().unwrap().len(), 1);
    assert_eq!(ctx.store.count_activity(issue.id).unwrap(), before);
}

#[tokio::test]
async fn label_filter_drops_unlabeled_items() {
    let ctx = TestContext::builder().label_filter("autoralph").build();
    ctx.tracker.add_simple_item("ext-1", "ABC-1", "unlabeled", "");
    ctx.tracker.add_item(ralph_gateways::TrackerItem {
        external_id: "ext-2".to_string(),
        identifier: "ABC-2".to_string(),
        title: "labeled".to_string(),
        description: String::new(),
        assignee_id: None,
        labels: vec!["autoralph".to_string()],
    });

    ctx.tracker_ingest.cycle().await;

    let issues = ctx.store.list_active_issues().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0].identifier, "ABC-2");
}

#[tokio::test]
async fn cycle_advances_the_tenant_cursor() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-1", "ABC-1", "t", "");
    ctx.tracker.set_next_cursor("page-2");

    ctx.tracker_ingest.cycle().await;

    let tenant = ctx.store.get_tenant(ctx.tenant.id).unwrap();
    assert_eq!(tenant.tracker_cursor.as_deref(), Some("page-2"));
}

#[tokio::test]
async fn failures_are_logged_against_the_tenant() {
    let ctx = TestContext::new();
    ctx.tracker.fail_next(GatewayError::Status { code: 401, body: "bad token".into() });

    ctx.tracker_ingest.cycle().await;

    // No issue exists; the error landed as tenant-level activity.
    assert!(ctx.store.list_active_issues().unwrap().is_empty());
    let feed = ctx.store.list_tenant_activity(ctx.tenant.id, None, 10).unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, ActivityKind::GatewayError);
    assert_eq!(feed[0].issue_id, None);
    assert!(feed[0].detail.contains("401"));
}

#[tokio::test]
async fn refining_comments_are_surfaced_and_cursor_advances() {
    let ctx = TestContext::new();
    let issue = ctx.seed_issue("ext-1", "ABC-1", "Add login");
    ctx.tick_until_state(issue.id, IssueState::Refining).await;

    ctx.tracker.add_comment("ext-1", 3, "operator", "add OAuth too");
    ctx.tracker_ingest.cycle().await;

    let issue = ctx.issue(issue.id);
    assert_eq!(issue.comment_cursor, 3);
    assert_eq!(issue.pending_comment.as_deref(), Some("add OAuth too"));

    // Re-poll of the same comments is silent.
    let before = ctx.store.count_activity(issue.id).unwrap();
    ctx.tracker_ingest.cycle().await;
    assert_eq!(ctx.store.count_activity(issue.id).unwrap(), before);
}

#[tokio::test]
async fn poll_loops_exit_between_cycles_on_cancellation() {
    let ctx = TestContext::new();
    let cancel = ctx.cancel.clone();
    let tracker = ctx.tracker_ingest;
    let forge = ctx.forge_ingest;

    let tracker_handle = tokio::spawn(async move { tracker.run().await });
    let forge_handle = tokio::spawn(async move { forge.run().await });
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    cancel.cancel();

    tokio::time::timeout(std::time::Duration::from_secs(1), tracker_handle)
        .await
        .expect("tracker poller did not exit")
        .unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), forge_handle)
        .await
        .expect("forge poller did not exit")
        .unwrap();
}

// ------------------------------------------------------------------ forge

/// Walk an issue to `in_review` with a change-request open on the fake
/// forge.
async fn issue_in_review(ctx: &TestContext) -> ralph_core::Issue {
    let issue = ctx.seed_issue("ext-1", "ABC-1", "Add login");
    ctx.tick_until_state(issue.id, IssueState::Refining).await;
    ctx.store.record_tracker_comment(issue.id, 1, "@autoralph approved").unwrap();
    ctx.tick_until_state(issue.id, IssueState::Approved).await;
    ctx.tick_until_state(issue.id, IssueState::InReview).await;
    ctx.issue(issue.id)
}

#[tokio::test]
async fn merged_cr_records_merge_signal() {
    let ctx = TestContext::new();
    let issue = issue_in_review(&ctx).await;
    let cr_id = issue.change_request.unwrap();

    ctx.forge.set_status(cr_id, CrStatus { merged: true, mergeable: None, latest_review: None });
    ctx.forge_ingest.cycle().await;

    assert_eq!(ctx.issue(issue.id).merge_signal, Some(MergeSignal::Merged));
}

#[tokio::test]
async fn trusted_changes_requested_captures_comments() {
    let ctx = TestContext::new();
    let issue = issue_in_review(&ctx).await;
    let cr_id = issue.change_request.unwrap();

    ctx.forge.set_status(
        cr_id,
        CrStatus {
            merged: false,
            mergeable: Some(true),
            latest_review: Some(Review {
                verdict: ReviewVerdict::ChangesRequested,
                reviewer_id: 42,
            }),
        },
    );
    ctx.forge.add_review_comment(
        cr_id,
        ReviewComment {
            id: 7,
            reviewer_id: 42,
            body: "rename field to `email_address`".to_string(),
            path: None,
        },
    );

    ctx.forge_ingest.cycle().await;

    let issue = ctx.issue(issue.id);
    assert!(issue.feedback_requested);
    assert_eq!(issue.review_cursor, 7);
    assert!(issue.feedback_comments.as_deref().unwrap().contains("email_address"));
}

#[tokio::test]
async fn rerunning_on_unchanged_cr_is_silent() {
    let ctx = TestContext::new();
    let issue = issue_in_review(&ctx).await;
    let cr_id = issue.change_request.unwrap();

    ctx.forge.set_status(
        cr_id,
        CrStatus {
            merged: false,
            mergeable: Some(true),
            latest_review: Some(Review {
                verdict: ReviewVerdict::ChangesRequested,
                reviewer_id: 42,
            }),
        },
    );
    ctx.forge.add_review_comment(
        cr_id,
        ReviewComment { id: 7, reviewer_id: 42, body: "fix".to_string(), path: None },
    );

    ctx.forge_ingest.cycle().await;
    let after_first = ctx.store.count_activity(issue.id).unwrap();

    ctx.forge_ingest.cycle().await;
    assert_eq!(ctx.store.count_activity(issue.id).unwrap(), after_first);
}

#[tokio::test]
async fn untrusted_review_is_recorded_and_skipped() {
    let ctx = TestContext::new();
    let issue = issue_in_review(&ctx).await;
    let cr_id = issue.change_request.unwrap();

    ctx.forge.set_status(
        cr_id,
        CrStatus {
            merged: false,
            mergeable: Some(true),
            latest_review: Some(Review {
                verdict: ReviewVerdict::ChangesRequested,
                reviewer_id: 99,
            }),
        },
    );

    ctx.forge_ingest.cycle().await;

    let after = ctx.issue(issue.id);
    assert_eq!(after.state, IssueState::InReview);
    assert!(!after.feedback_requested);

    let activity = ctx.store.list_activity(issue.id, None, 5).unwrap();
    assert_eq!(activity[0].kind, ActivityKind::UntrustedFeedbackSkipped);
    assert!(activity[0].detail.contains("99"));
}

#[tokio::test]
async fn hard_conflict_records_conflict_signal() {
    let ctx = TestContext::new();
    let issue = issue_in_review(&ctx).await;
    let cr_id = issue.change_request.unwrap();

    ctx.forge.set_status(
        cr_id,
        CrStatus { merged: false, mergeable: Some(false), latest_review: None },
    );
    ctx.forge_ingest.cycle().await;

    assert_eq!(ctx.issue(issue.id).merge_signal, Some(MergeSignal::Conflict));
}

#[tokio::test]
async fn forge_poll_failure_is_logged_per_issue() {
    let ctx = TestContext::new();
    let issue = issue_in_review(&ctx).await;

    ctx.forge.fail_next(GatewayError::Status { code: 401, body: "bad token".into() });
    ctx.forge_ingest.cycle().await;

    let activity = ctx.store.list_activity(issue.id, None, 5).unwrap();
    assert_eq!(activity[0].kind, ActivityKind::GatewayError);
    // State untouched.
    assert_eq!(ctx.issue(issue.id).state, IssueState::InReview);
}
