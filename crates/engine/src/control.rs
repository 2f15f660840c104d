// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator controls: pause, resume, retry.
//!
//! These are the user-invoked transitions of the lifecycle diagram,
//! reached through the API rather than the tick loop.

use std::sync::Arc;

use ralph_core::{Issue, IssueId, IssuePatch, IssueState};
use ralph_gateways::CodegenGateway;
use ralph_store::Store;

use crate::error::EngineError;
use crate::pool::BuildPool;

pub struct Control<G> {
    store: Arc<Store>,
    pool: Arc<BuildPool<G>>,
}

impl<G: CodegenGateway> Control<G> {
    pub fn new(store: Arc<Store>, pool: Arc<BuildPool<G>>) -> Self {
        Self { store, pool }
    }

    /// Pause an issue in any active-work state. A running build is
    /// cancelled and drained first; partial work stays on disk.
    pub async fn pause(&self, issue_id: IssueId) -> Result<Issue, EngineError> {
        let issue = self.store.get_issue(issue_id)?;
        if !issue.state.is_active_work() {
            return Err(EngineError::InvalidControl {
                issue: issue_id,
                action: "pause",
                state: issue.state,
            });
        }

        if issue.state.is_build_state() {
            self.pool.cancel_and_wait(issue_id).await;
        }

        let patch = IssuePatch::default().set_paused_from(issue.state).set_build_active(false);
        Ok(self.store.transition(
            issue_id,
            issue.state,
            IssueState::Paused,
            patch,
            "operator pause",
        )?)
    }

    /// Resume a paused issue into the state it was paused from. A resumed
    /// build state has no live job; the orchestrator's idle rule
    /// re-dispatches it.
    pub async fn resume(&self, issue_id: IssueId) -> Result<Issue, EngineError> {
        let issue = self.store.get_issue(issue_id)?;
        let (IssueState::Paused, Some(target)) = (issue.state, issue.paused_from) else {
            return Err(EngineError::InvalidControl {
                issue: issue_id,
                action: "resume",
                state: issue.state,
            });
        };

        let patch = IssuePatch::default().clear_paused_from();
        Ok(self.store.transition(
            issue_id,
            IssueState::Paused,
            target,
            patch,
            "operator resume",
        )?)
    }

    /// Retry a failed issue: restore the pre-failure state and clear the
    /// error. A failed build retries to `approved` so dispatch goes back
    /// through the pool's backpressure path.
    pub async fn retry(&self, issue_id: IssueId) -> Result<Issue, EngineError> {
        let issue = self.store.get_issue(issue_id)?;
        let (IssueState::Failed, Some(pre)) = (issue.state, issue.pre_failure_state) else {
            return Err(EngineError::InvalidControl {
                issue: issue_id,
                action: "retry",
                state: issue.state,
            });
        };

        let target = match pre {
            IssueState::Building | IssueState::AddressingFeedback => IssueState::Approved,
            other => other,
        };
        let patch = IssuePatch::default()
            .clear_error()
            .clear_pre_failure_state()
            .clear_build_outcome();
        Ok(self.store.transition(
            issue_id,
            IssueState::Failed,
            target,
            patch,
            "operator retry",
        )?)
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
