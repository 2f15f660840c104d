// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end lifecycle scenarios over the real store and fake gateways,
//! driving the orchestrator, ingestors, and pool the way the daemon does.

use ralph_core::{ActivityKind, BuildPayload, IssueState};
use ralph_engine::pool::recover;
use ralph_engine::test_helpers::TestContext;
use ralph_gateways::{CrStatus, Review, ReviewComment, ReviewVerdict, ScriptedBuild};

/// S1 — Happy path: queued → refining → approved → building → in_review →
/// completed, with the tracker item closed at the end.
#[tokio::test]
async fn s1_happy_path() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-abc-1", "ABC-1", "Add login", "email+password");
    ctx.codegen.push_build(ScriptedBuild::success(vec![
        BuildPayload::IterationStart { iteration: 1 },
        BuildPayload::InvocationDone { tokens_in: 900, tokens_out: 300 },
    ]));

    // Ingest creates the issue; the first tick posts a plan.
    ctx.tracker_ingest.cycle().await;
    let issue = &ctx.store.list_active_issues().unwrap()[0];
    let id = issue.id;
    assert_eq!(issue.state, IssueState::Queued);

    ctx.tick_until_state(id, IssueState::Refining).await;
    assert_eq!(ctx.tracker.posted_comments().len(), 1);

    // Operator approves the posted plan.
    ctx.tracker.add_comment("ext-abc-1", 1, "operator", "@autoralph approved");
    ctx.tracker_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::Approved).await;
    assert!(ctx.issue(id).approved_plan.is_some());

    // Build streams events and exits cleanly; the CR opens.
    ctx.tick_until_state(id, IssueState::InReview).await;
    let in_review = ctx.issue(id);
    let cr_id = in_review.change_request.unwrap();
    assert_eq!(ctx.forge.opened_crs()[0].2, "Add login");
    assert_eq!(in_review.tokens_in, 900);

    // The forge reports the merge; the issue completes.
    ctx.forge.set_status(cr_id, CrStatus { merged: true, mergeable: None, latest_review: None });
    ctx.forge_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::Completed).await;

    assert_eq!(ctx.tracker.done_items(), vec!["ext-abc-1".to_string()]);
    assert_eq!(ctx.issue(id).workspace, None);
    assert!(ctx.store.count_activity(id).unwrap() >= 6);
}

/// S2 — Refinement iteration: a non-approval comment produces plan v2
/// before the approval lands.
#[tokio::test]
async fn s2_refinement_iteration() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-abc-2", "ABC-2", "Add signup", "");
    ctx.codegen.push_plan("## Plan v1");
    ctx.codegen.push_plan("## Plan v2 with OAuth");

    ctx.tracker_ingest.cycle().await;
    let id = ctx.store.list_active_issues().unwrap()[0].id;
    ctx.tick_until_state(id, IssueState::Refining).await;

    ctx.tracker.add_comment("ext-abc-2", 1, "operator", "add OAuth too");
    ctx.tracker_ingest.cycle().await;
    ctx.orchestrator.tick().await.unwrap();

    let issue = ctx.issue(id);
    assert_eq!(issue.state, IssueState::Refining);
    assert_eq!(issue.refine_iterations, 2);
    assert!(issue.plan.as_deref().unwrap().contains("OAuth"));

    ctx.tracker.add_comment("ext-abc-2", 2, "operator", "@autoralph approved");
    ctx.tracker_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::Approved).await;
    assert!(ctx.issue(id).approved_plan.as_deref().unwrap().contains("OAuth"));
}

/// S3 — Review feedback: trusted changes_requested runs a feedback build,
/// pushes, and replies to the original comment.
#[tokio::test]
async fn s3_review_feedback() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-abc-1", "ABC-1", "Add login", "");
    ctx.tracker_ingest.cycle().await;
    let id = ctx.store.list_active_issues().unwrap()[0].id;

    ctx.tick_until_state(id, IssueState::Refining).await;
    ctx.tracker.add_comment("ext-abc-1", 1, "operator", "@autoralph approved");
    ctx.tracker_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::InReview).await;
    let cr_id = ctx.issue(id).change_request.unwrap();

    // Trusted reviewer (id 42 in the test tenant) requests changes.
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

    ctx.tick_until_state(id, IssueState::AddressingFeedback).await;
    ctx.wait_build_settled(id).await;
    ctx.tick_until_state(id, IssueState::InReview).await;

    // The feedback build saw the review text, the push happened, and the
    // original comment got a reply.
    let starts = ctx.codegen.build_starts();
    assert!(starts[1].1.contains("email_address"));
    assert_eq!(ctx.forge.pushed_branches().len(), 2);
    let replies = ctx.forge.replies();
    assert_eq!(replies, vec![(cr_id, 7, "Addressed in the latest push.".to_string())]);
}

/// S4 — Build failure then retry: failed with the stderr captured, then a
/// fresh dispatch after the operator retries (back through `approved`).
#[tokio::test]
async fn s4_build_failure_then_retry() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-abc-1", "ABC-1", "Add login", "");
    ctx.codegen.push_build(ScriptedBuild::failure(Vec::new(), "compile error"));

    ctx.tracker_ingest.cycle().await;
    let id = ctx.store.list_active_issues().unwrap()[0].id;
    ctx.tick_until_state(id, IssueState::Refining).await;
    ctx.tracker.add_comment("ext-abc-1", 1, "operator", "@autoralph approved");
    ctx.tracker_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::Failed).await;

    let failed = ctx.issue(id);
    assert_eq!(failed.error.as_deref(), Some("compile error"));
    assert_eq!(failed.pre_failure_state, Some(IssueState::Building));
    assert!(failed.workspace.as_ref().unwrap().exists(), "workspace retained");

    // Operator retry: back to approved, then a fresh dispatch succeeds.
    ctx.control.retry(id).await.unwrap();
    assert_eq!(ctx.issue(id).state, IssueState::Approved);
    ctx.tick_until_state(id, IssueState::InReview).await;
    assert_eq!(ctx.issue(id).build_attempts, 2);
}

/// S5 — Untrusted feedback ignored: reviewer 99 requests changes while 42
/// is trusted; no state change, one `untrusted_feedback_skipped` entry.
#[tokio::test]
async fn s5_untrusted_feedback_ignored() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-abc-1", "ABC-1", "Add login", "");
    ctx.tracker_ingest.cycle().await;
    let id = ctx.store.list_active_issues().unwrap()[0].id;
    ctx.tick_until_state(id, IssueState::Refining).await;
    ctx.tracker.add_comment("ext-abc-1", 1, "operator", "@autoralph approved");
    ctx.tracker_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::InReview).await;
    let cr_id = ctx.issue(id).change_request.unwrap();

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
    assert_eq!(ctx.orchestrator.tick().await.unwrap(), 0);

    let issue = ctx.issue(id);
    assert_eq!(issue.state, IssueState::InReview);
    assert!(!issue.feedback_requested);

    let activity = ctx.store.list_activity(id, None, 5).unwrap();
    assert_eq!(activity[0].kind, ActivityKind::UntrustedFeedbackSkipped);
    assert!(activity[0].detail.contains("99"));
}

/// Invariant: every state change published over the whole lifecycle is a
/// legal edge of the diagram, and the sequence is gapless.
#[tokio::test]
async fn full_history_is_a_legal_walk() {
    let ctx = TestContext::new();
    let mut events = ctx.bus.subscribe();

    ctx.tracker.add_simple_item("ext-abc-1", "ABC-1", "Add login", "");
    ctx.tracker_ingest.cycle().await;
    let id = ctx.store.list_active_issues().unwrap()[0].id;
    ctx.tick_until_state(id, IssueState::Refining).await;
    ctx.tracker.add_comment("ext-abc-1", 1, "operator", "@autoralph approved");
    ctx.tracker_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::InReview).await;

    // One feedback round, then merge.
    let cr_id = ctx.issue(id).change_request.unwrap();
    ctx.forge.add_review_comment(
        cr_id,
        ReviewComment { id: 3, reviewer_id: 42, body: "nit".to_string(), path: None },
    );
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
    ctx.forge_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::AddressingFeedback).await;
    ctx.wait_build_settled(id).await;
    ctx.tick_until_state(id, IssueState::InReview).await;
    ctx.forge.set_status(cr_id, CrStatus { merged: true, mergeable: None, latest_review: None });
    ctx.forge_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::Completed).await;

    let mut walk = vec![IssueState::Queued];
    while let Ok(event) = events.try_recv() {
        if let ralph_core::BusEvent::StateChanged { issue_id, from, to, .. } = event {
            assert_eq!(issue_id, id);
            assert_eq!(from, *walk.last().unwrap(), "gap in the state sequence");
            assert!(from.may_transition_to(to), "illegal edge {} -> {}", from, to);
            walk.push(to);
        }
    }
    assert_eq!(*walk.last().unwrap(), IssueState::Completed);
    assert!(walk.len() >= 8, "expected the full lifecycle, got {:?}", walk);
}

/// S6 — Crash during build: a `build_active` row with no live subprocess
/// fails with "interrupted" in the recovery sweep, before the first tick.
#[tokio::test]
async fn s6_crash_during_build() {
    let ctx = TestContext::new();
    ctx.tracker.add_simple_item("ext-abc-1", "ABC-1", "Add login", "");
    ctx.codegen.push_build(ScriptedBuild::hanging(Vec::new()));

    ctx.tracker_ingest.cycle().await;
    let id = ctx.store.list_active_issues().unwrap()[0].id;
    ctx.tick_until_state(id, IssueState::Refining).await;
    ctx.tracker.add_comment("ext-abc-1", 1, "operator", "@autoralph approved");
    ctx.tracker_ingest.cycle().await;
    ctx.tick_until_state(id, IssueState::Building).await;
    assert!(ctx.issue(id).build_active);

    // "Crash": the process dies with the flag set; on the next boot the
    // sweep runs before the orchestrator starts.
    let recovered = recover(&ctx.store).unwrap();
    assert_eq!(recovered, 1);

    let issue = ctx.issue(id);
    assert_eq!(issue.state, IssueState::Failed);
    assert_eq!(issue.error.as_deref(), Some("interrupted"));
    assert_eq!(issue.pre_failure_state, Some(IssueState::Building));
    assert!(!issue.build_active);
}
