// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::TestContext;
use ralph_core::{Issue, IssueState};
use ralph_gateways::ScriptedBuild;

/// Walk an issue to `building` with a scripted build queued.
async fn building_issue(ctx: &TestContext, build: ScriptedBuild) -> Issue {
    ctx.codegen.push_build(build);
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    ctx.tick_until_state(issue.id, IssueState::Refining).await;
    ctx.store.record_tracker_comment(issue.id, 1, "@autoralph approved").unwrap();
    ctx.tick_until_state(issue.id, IssueState::Building).await;
    ctx.issue(issue.id)
}

#[tokio::test]
async fn slots_are_bounded_by_pool_size() {
    let ctx = TestContext::builder().pool_size(2).build();
    let a = ctx.pool.try_reserve();
    let b = ctx.pool.try_reserve();
    assert!(a.is_some());
    assert!(b.is_some());
    assert!(ctx.pool.try_reserve().is_none());

    drop(a);
    assert!(ctx.pool.try_reserve().is_some());
}

#[tokio::test]
async fn events_are_appended_and_outcome_recorded() {
    let ctx = TestContext::new();
    let issue = building_issue(
        &ctx,
        ScriptedBuild::success(vec![
            ralph_core::BuildPayload::StoryStarted { title: "login form".to_string() },
            ralph_core::BuildPayload::QaPhase { phase: "tests".to_string() },
        ]),
    )
    .await;

    ctx.wait_build_settled(issue.id).await;

    let events = ctx.store.list_build_events(issue.id, None, 10).unwrap();
    assert_eq!(events.len(), 2);
    let issue = ctx.issue(issue.id);
    assert_eq!(issue.build_outcome, Some(ralph_core::BuildOutcome::Success));
    assert!(!issue.build_active);
    assert_eq!(ctx.pool.running(), 0);
}

#[tokio::test]
async fn cancel_and_wait_leaves_no_outcome() {
    let ctx = TestContext::new();
    let issue = building_issue(&ctx, ScriptedBuild::hanging(Vec::new())).await;
    assert!(ctx.issue(issue.id).build_active);

    ctx.pool.cancel_and_wait(issue.id).await;

    let issue = ctx.issue(issue.id);
    assert!(!issue.build_active);
    assert_eq!(issue.build_outcome, None);
    assert_eq!(ctx.pool.running(), 0);
}

#[tokio::test]
async fn shutdown_drains_all_jobs() {
    let ctx = TestContext::builder().pool_size(2).build();
    // Two hanging builds across two issues.
    for n in 0..2 {
        ctx.codegen.push_build(ScriptedBuild::hanging(Vec::new()));
        let issue = ctx.seed_issue(&format!("ext-{}", n), &format!("ABC-{}", n), "t");
        ctx.tick_until_state(issue.id, IssueState::Refining).await;
        ctx.store.record_tracker_comment(issue.id, 1, "@autoralph approved").unwrap();
        ctx.tick_until_state(issue.id, IssueState::Building).await;
    }
    assert_eq!(ctx.pool.running(), 2);

    ctx.pool.shutdown(std::time::Duration::from_secs(5)).await;

    assert_eq!(ctx.pool.running(), 0);
    for issue in ctx.store.list_recoverable_builds().unwrap() {
        panic!("issue {} still flagged build_active after drain", issue.id);
    }
}

#[tokio::test(start_paused = true)]
async fn usage_limit_wait_pauses_consumption() {
    let ctx = TestContext::new();
    let issue = building_issue(
        &ctx,
        ScriptedBuild::success(vec![
            ralph_core::BuildPayload::UsageLimitWait { wait_ms: 60_000 },
            ralph_core::BuildPayload::LogMessage { message: "resumed".to_string() },
        ]),
    )
    .await;

    // The declared wait elapses virtually under paused time; the build
    // still settles with both events recorded.
    ctx.wait_build_settled(issue.id).await;
    let events = ctx.store.list_build_events(issue.id, None, 10).unwrap();
    assert_eq!(events.len(), 2);
}

#[tokio::test]
async fn cancellation_cuts_a_usage_limit_wait_short() {
    let ctx = TestContext::new();
    // An hour-long declared wait; cancellation must win.
    let issue = building_issue(
        &ctx,
        ScriptedBuild::hanging(vec![ralph_core::BuildPayload::UsageLimitWait {
            wait_ms: 3_600_000,
        }]),
    )
    .await;

    // Let the consumer enter the wait, then cancel.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    ctx.pool.cancel_and_wait(issue.id).await;

    let issue = ctx.issue(issue.id);
    assert!(!issue.build_active);
    assert_eq!(issue.build_outcome, None);
}

#[tokio::test]
async fn recovery_fails_interrupted_builds() {
    let ctx = TestContext::new();
    let issue = building_issue(&ctx, ScriptedBuild::hanging(Vec::new())).await;

    // Simulate a crash: forget the job without clearing the flag.
    ctx.cancel.cancel();
    let flagged = ctx.store.list_recoverable_builds().unwrap();
    assert_eq!(flagged.len(), 1);

    let recovered = recover(&ctx.store).unwrap();
    assert_eq!(recovered, 1);

    let issue = ctx.issue(issue.id);
    assert_eq!(issue.state, IssueState::Failed);
    assert_eq!(issue.error.as_deref(), Some("interrupted"));
    assert_eq!(issue.pre_failure_state, Some(IssueState::Building));
    assert!(!issue.build_active);
    // Workspace retained for diagnosis.
    assert!(issue.workspace.as_ref().unwrap().exists());
}

#[tokio::test]
async fn recovery_with_no_flags_is_a_no_op() {
    let ctx = TestContext::new();
    ctx.seed_issue("ext-1", "ABC-1", "t");
    assert_eq!(recover(&ctx.store).unwrap(), 0);
}

#[tokio::test]
async fn spawn_failure_records_a_build_outcome() {
    let ctx = TestContext::new();
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    ctx.tick_until_state(issue.id, IssueState::Refining).await;
    ctx.store.record_tracker_comment(issue.id, 1, "@autoralph approved").unwrap();
    ctx.tick_until_state(issue.id, IssueState::Approved).await;

    // The dispatch transition succeeds, then the spawn fails and the
    // orchestrator fails the issue on the following tick.
    ctx.codegen.fail_next(ralph_gateways::GatewayError::Subprocess("no binary".into()));
    ctx.tick_until_state(issue.id, IssueState::Failed).await;

    let issue = ctx.issue(issue.id);
    assert!(issue.error.as_deref().unwrap().contains("spawn failed"));
    assert_eq!(issue.pre_failure_state, Some(IssueState::Building));
}
