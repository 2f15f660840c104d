// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The deterministic state machine driving issues through their lifecycle.
//!
//! Transitions are registered at startup as `(from_state, condition,
//! action)` rows. Each tick scans the non-terminal issues; rows matching
//! an issue's state are evaluated in registration order and the first
//! matching condition invokes its action — at most one transition per
//! issue per tick. Optimistic-concurrency conflicts from the store are
//! benign and re-evaluated next tick.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ralph_core::{ActivityKind, Issue, IssuePatch, IssueState, MergeSignal, Tenant, TenantId};
use ralph_gateways::{CodegenGateway, ForgeGateway, TrackerGateway};
use ralph_store::Store;
use tokio_util::sync::CancellationToken;

use crate::actions::Actions;
use crate::error::EngineError;
use crate::pool::BuildPool;

/// Condition predicates over the issue row and tenant config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Condition {
    Always,
    /// Pending tracker comment without the approval marker.
    CommentWithoutMarker,
    /// Pending tracker comment containing the approval marker.
    CommentWithMarker,
    /// The pool delivered a successful outcome.
    BuildSucceeded,
    /// The pool delivered a failure outcome.
    BuildFailed,
    /// No outcome and no running job (resume / drained shutdown).
    BuildIdle,
    /// The forge ingestor saw the change-request merge.
    Merged,
    /// A trusted reviewer requested changes.
    FeedbackRequested,
    /// The forge ingestor saw a hard merge conflict.
    MergeConflict,
}

impl Condition {
    fn matches(&self, tenant: &Tenant, issue: &Issue) -> bool {
        match self {
            Condition::Always => true,
            Condition::CommentWithoutMarker => issue
                .pending_comment
                .as_deref()
                .is_some_and(|c| !tenant.is_approval(c)),
            Condition::CommentWithMarker => issue
                .pending_comment
                .as_deref()
                .is_some_and(|c| tenant.is_approval(c)),
            Condition::BuildSucceeded => {
                issue.build_outcome.as_ref().is_some_and(|o| o.is_success())
            }
            Condition::BuildFailed => {
                issue.build_outcome.as_ref().is_some_and(|o| !o.is_success())
            }
            Condition::BuildIdle => !issue.build_active && issue.build_outcome.is_none(),
            Condition::Merged => issue.merge_signal == Some(MergeSignal::Merged),
            Condition::FeedbackRequested => issue.feedback_requested,
            Condition::MergeConflict => issue.merge_signal == Some(MergeSignal::Conflict),
        }
    }
}

/// Action identifiers; dispatch is a table lookup, not a hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActionKind {
    Refine,
    Approve,
    DispatchBuild,
    RedispatchBuild,
    OpenChangeRequest,
    RecordBuildFailure,
    DispatchFeedback,
    FinishFeedback,
    Complete,
    PauseOnConflict,
}

struct Rule {
    from: IssueState,
    condition: Condition,
    action: ActionKind,
}

/// The transition table, in registration (= evaluation) order.
fn transition_table() -> Vec<Rule> {
    use ActionKind as A;
    use Condition as C;
    use IssueState as S;
    let rule = |from, condition, action| Rule { from, condition, action };
    vec![
        rule(S::Queued, C::Always, A::Refine),
        rule(S::Refining, C::CommentWithoutMarker, A::Refine),
        rule(S::Refining, C::CommentWithMarker, A::Approve),
        rule(S::Approved, C::Always, A::DispatchBuild),
        rule(S::Building, C::BuildSucceeded, A::OpenChangeRequest),
        rule(S::Building, C::BuildFailed, A::RecordBuildFailure),
        rule(S::Building, C::MergeConflict, A::PauseOnConflict),
        rule(S::Building, C::BuildIdle, A::RedispatchBuild),
        rule(S::InReview, C::Merged, A::Complete),
        rule(S::InReview, C::FeedbackRequested, A::DispatchFeedback),
        rule(S::InReview, C::MergeConflict, A::PauseOnConflict),
        rule(S::AddressingFeedback, C::BuildSucceeded, A::FinishFeedback),
        rule(S::AddressingFeedback, C::BuildFailed, A::RecordBuildFailure),
        rule(S::AddressingFeedback, C::MergeConflict, A::PauseOnConflict),
        rule(S::AddressingFeedback, C::BuildIdle, A::RedispatchBuild),
    ]
}

pub struct Orchestrator<T, F, G> {
    store: Arc<Store>,
    actions: Actions<T, F, G>,
    pool: Arc<BuildPool<G>>,
    tenants: Arc<HashMap<TenantId, Tenant>>,
    rules: Vec<Rule>,
    tick_interval: Duration,
    cancel: CancellationToken,
}

impl<T, F, G> Orchestrator<T, F, G>
where
    T: TrackerGateway,
    F: ForgeGateway,
    G: CodegenGateway,
{
    pub fn new(
        store: Arc<Store>,
        actions: Actions<T, F, G>,
        pool: Arc<BuildPool<G>>,
        tenants: Arc<HashMap<TenantId, Tenant>>,
        tick_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            actions,
            pool,
            tenants,
            rules: transition_table(),
            tick_interval,
            cancel,
        }
    }

    /// Run the tick loop until cancellation. Rate-limited to one tick per
    /// interval; exits between ticks.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(self.tick_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = interval.tick() => {}
            }
            if let Err(e) = self.tick().await {
                tracing::error!(error = %e, "orchestrator tick failed");
            }
        }
    }

    /// One evaluation pass over all active issues. Returns the number of
    /// transitions applied.
    pub async fn tick(&self) -> Result<u32, EngineError> {
        let issues = self.store.list_active_issues()?;
        let mut transitions = 0;
        for issue in issues {
            let Some(tenant) = self.tenants.get(&issue.tenant_id) else {
                tracing::warn!(issue_id = %issue.id, tenant_id = %issue.tenant_id, "no tenant for issue");
                continue;
            };
            if self.evaluate(tenant, &issue).await {
                transitions += 1;
            }
        }
        Ok(transitions)
    }

    /// Evaluate one issue: first matching rule wins, at most one
    /// transition. Returns whether a transition was applied.
    async fn evaluate(&self, tenant: &Tenant, issue: &Issue) -> bool {
        for rule in self.rules.iter().filter(|r| r.from == issue.state) {
            if !rule.condition.matches(tenant, issue) {
                continue;
            }
            let result = self.run_action(rule.action, tenant, issue).await;
            return match result {
                Ok(Some(outcome)) => self.apply(issue, outcome).await,
                Ok(None) => false,
                Err(e) => {
                    self.handle_action_error(tenant, issue, e).await;
                    false
                }
            };
        }
        false
    }

    async fn run_action(
        &self,
        action: ActionKind,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<crate::actions::ActionOutcome>, EngineError> {
        match action {
            ActionKind::Refine => self.actions.refine(tenant, issue).await,
            ActionKind::Approve => self.actions.approve(tenant, issue).await,
            ActionKind::DispatchBuild => self.actions.dispatch_build(tenant, issue).await,
            ActionKind::RedispatchBuild => self.actions.redispatch_build(tenant, issue).await,
            ActionKind::OpenChangeRequest => {
                self.actions.open_change_request(tenant, issue).await
            }
            ActionKind::RecordBuildFailure => {
                self.actions.record_build_failure(tenant, issue).await
            }
            ActionKind::DispatchFeedback => self.actions.dispatch_feedback(tenant, issue).await,
            ActionKind::FinishFeedback => self.actions.finish_feedback(tenant, issue).await,
            ActionKind::Complete => self.actions.complete(tenant, issue).await,
            ActionKind::PauseOnConflict => self.actions.pause_on_conflict(tenant, issue).await,
        }
    }

    /// Apply a proposed transition; spawn the follow-up build job only
    /// once the transition is durable.
    async fn apply(&self, issue: &Issue, outcome: crate::actions::ActionOutcome) -> bool {
        let crate::actions::ActionOutcome { to, patch, detail, followup } = outcome;
        match self.store.transition(issue.id, issue.state, to, patch, &detail) {
            Ok(_) => {
                if let Some(request) = followup {
                    self.pool.spawn(request).await;
                }
                true
            }
            Err(e) if e.is_conflict() => {
                // Another writer moved the issue; re-evaluate next tick.
                tracing::debug!(issue_id = %issue.id, error = %e, "transition conflict, skipping");
                false
            }
            Err(e) => {
                tracing::error!(issue_id = %issue.id, error = %e, "transition failed");
                false
            }
        }
    }

    /// Terminal action errors fail the issue when it is in an active-work
    /// state; elsewhere they are logged only.
    async fn handle_action_error(&self, tenant: &Tenant, issue: &Issue, error: EngineError) {
        if error.is_conflict() {
            return;
        }
        tracing::warn!(issue_id = %issue.id, error = %error, "action failed");
        if let Err(e) = self.store.append_activity(
            tenant.id,
            Some(issue.id),
            ActivityKind::GatewayError,
            &error.to_string(),
        ) {
            tracing::error!(issue_id = %issue.id, error = %e, "failed to log action error");
        }

        if !issue.state.is_active_work() {
            return;
        }
        let patch = IssuePatch::default()
            .set_error(error.to_string())
            .set_pre_failure_state(issue.state)
            .set_build_active(false)
            .clear_build_outcome();
        if let Err(e) = self.store.transition(
            issue.id,
            issue.state,
            IssueState::Failed,
            patch,
            "action failed",
        ) {
            if !e.is_conflict() {
                tracing::error!(issue_id = %issue.id, error = %e, "failed to fail issue");
            }
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
