// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::TestContext;
use ralph_gateways::ScriptedBuild;

#[tokio::test]
async fn pause_and_resume_round_trip() {
    let ctx = TestContext::new();
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    ctx.tick_until_state(issue.id, IssueState::Refining).await;

    let paused = ctx.control.pause(issue.id).await.unwrap();
    assert_eq!(paused.state, IssueState::Paused);
    assert_eq!(paused.paused_from, Some(IssueState::Refining));

    // Paused issues are invisible to the tick loop.
    assert_eq!(ctx.orchestrator.tick().await.unwrap(), 0);

    let resumed = ctx.control.resume(issue.id).await.unwrap();
    assert_eq!(resumed.state, IssueState::Refining);
    assert_eq!(resumed.paused_from, None);
}

#[tokio::test]
async fn pause_during_build_cancels_and_resume_redispatches() {
    let ctx = TestContext::new();
    ctx.codegen.push_build(ScriptedBuild::hanging(Vec::new()));
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    ctx.tick_until_state(issue.id, IssueState::Refining).await;
    ctx.store.record_tracker_comment(issue.id, 1, "@autoralph approved").unwrap();
    ctx.tick_until_state(issue.id, IssueState::Building).await;

    let paused = ctx.control.pause(issue.id).await.unwrap();
    assert_eq!(paused.paused_from, Some(IssueState::Building));
    assert!(!paused.build_active);
    assert_eq!(ctx.pool.running(), 0);
    // Workspace retained while paused.
    assert!(paused.workspace.as_ref().unwrap().exists());

    // Resume restores `building`; the idle rule re-dispatches (the next
    // scripted build succeeds immediately).
    let resumed = ctx.control.resume(issue.id).await.unwrap();
    assert_eq!(resumed.state, IssueState::Building);
    ctx.tick_until_state(issue.id, IssueState::InReview).await;
    assert_eq!(ctx.codegen.build_starts().len(), 2);
}

#[tokio::test]
async fn retry_after_build_failure_returns_to_approved() {
    let ctx = TestContext::new();
    ctx.codegen.push_build(ScriptedBuild::failure(Vec::new(), "compile error"));
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    ctx.tick_until_state(issue.id, IssueState::Refining).await;
    ctx.store.record_tracker_comment(issue.id, 1, "@autoralph approved").unwrap();
    ctx.tick_until_state(issue.id, IssueState::Failed).await;

    let retried = ctx.control.retry(issue.id).await.unwrap();
    assert_eq!(retried.state, IssueState::Approved);
    assert_eq!(retried.error, None);
    assert_eq!(retried.pre_failure_state, None);

    // A fresh dispatch happens on the next ticks.
    ctx.tick_until_state(issue.id, IssueState::InReview).await;
    assert_eq!(ctx.issue(issue.id).build_attempts, 2);
}

#[tokio::test]
async fn retry_restores_non_build_states_verbatim() {
    let ctx = TestContext::new();
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    // Fail out of queued via a permanent gateway error.
    ctx.codegen.fail_next(ralph_gateways::GatewayError::Status {
        code: 400,
        body: "bad".into(),
    });
    ctx.tick_until_state(issue.id, IssueState::Failed).await;
    assert_eq!(ctx.issue(issue.id).pre_failure_state, Some(IssueState::Queued));

    let retried = ctx.control.retry(issue.id).await.unwrap();
    assert_eq!(retried.state, IssueState::Queued);
}

#[tokio::test]
async fn controls_reject_wrong_states() {
    let ctx = TestContext::new();
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");

    // Resume and retry require paused/failed.
    assert!(matches!(
        ctx.control.resume(issue.id).await,
        Err(EngineError::InvalidControl { action: "resume", .. })
    ));
    assert!(matches!(
        ctx.control.retry(issue.id).await,
        Err(EngineError::InvalidControl { action: "retry", .. })
    ));

    // Pause requires an active-work state.
    ctx.control.pause(issue.id).await.unwrap();
    assert!(matches!(
        ctx.control.pause(issue.id).await,
        Err(EngineError::InvalidControl { action: "pause", .. })
    ));
}
