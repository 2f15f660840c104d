// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Build dispatch and build-outcome actions.

use ralph_core::{BuildOutcome, Issue, IssuePatch, IssueState, Tenant};
use ralph_gateways::{with_retry, CodegenGateway, ForgeGateway, TrackerGateway};

use super::{ActionOutcome, Actions};
use crate::error::EngineError;
use crate::pool::BuildRequest;
use crate::workspace;

impl<T, F, G> Actions<T, F, G>
where
    T: TrackerGateway,
    F: ForgeGateway,
    G: CodegenGateway,
{
    /// Prepare the workspace and hand a build job to the pool.
    ///
    /// Declines when the pool is full — the issue stays `approved` and the
    /// next tick retries (store-backed backpressure).
    pub async fn dispatch_build(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let Some(slot) = self.pool.try_reserve() else {
            return Ok(None);
        };
        let Some(plan) = issue.approved_plan.clone() else {
            // Approved without a plan would violate the approval invariant;
            // treat as a hard action error.
            return Err(EngineError::Workspace("approved issue has no plan".into()));
        };

        let path = workspace::create(&self.config, tenant, issue, &plan).await?;

        let patch = IssuePatch::default()
            .set_workspace(path.clone())
            .set_build_active(true)
            .clear_build_outcome()
            .clear_merge_signal()
            .clear_error();
        let request = BuildRequest {
            slot,
            issue_id: issue.id,
            workspace: path,
            prompt: plan,
            max_iterations: tenant.max_iterations,
        };
        Ok(Some(
            ActionOutcome::new(
                IssueState::Building,
                patch,
                format!("build dispatched (attempt {})", issue.build_attempts + 1),
            )
            .with_followup(request),
        ))
    }

    /// Re-dispatch a build that lost its job without an outcome (resume
    /// after pause, or a shutdown that drained cleanly). The workspace is
    /// reused as-is.
    pub async fn redispatch_build(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let Some(slot) = self.pool.try_reserve() else {
            return Ok(None);
        };
        let (Some(workspace), Some(plan)) = (issue.workspace.clone(), issue.approved_plan.clone())
        else {
            return Err(EngineError::Workspace("no workspace to re-dispatch into".into()));
        };

        let prompt = match issue.state {
            IssueState::AddressingFeedback => feedback_prompt(issue),
            _ => plan,
        };
        let patch = IssuePatch::default().set_build_active(true).clear_build_outcome();
        let request = BuildRequest {
            slot,
            issue_id: issue.id,
            workspace,
            prompt,
            max_iterations: tenant.max_iterations,
        };
        Ok(Some(
            ActionOutcome::new(issue.state, patch, "build re-dispatched".to_string())
                .with_followup(request),
        ))
    }

    /// After a successful build: push the branch and open the
    /// change-request.
    ///
    /// Idempotent: a change-request id already on record (an earlier
    /// attempt that failed after opening) is reused instead of opening a
    /// duplicate.
    pub async fn open_change_request(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let Some(ws) = issue.workspace.clone() else {
            return Err(EngineError::Workspace("successful build has no workspace".into()));
        };
        let branch = workspace::branch_name(tenant, issue);

        with_retry(&self.config.retry, &self.cancel, || {
            self.forge.push_branch(tenant, &branch, &ws)
        })
        .await?;

        let cr_id = match issue.change_request {
            Some(existing) => existing,
            None => {
                let body = cr_body(issue, &ws).await;
                with_retry(&self.config.retry, &self.cancel, || {
                    self.forge.open_change_request(
                        tenant,
                        &branch,
                        &tenant.base_branch,
                        &issue.title,
                        &body,
                    )
                })
                .await?
            }
        };

        let patch = IssuePatch::default().set_change_request(cr_id).clear_build_outcome();
        Ok(Some(ActionOutcome::new(
            IssueState::InReview,
            patch,
            format!("change-request #{} opened", cr_id),
        )))
    }

    /// Record a failed build. The workspace is preserved for diagnosis and
    /// the operator retries via the API.
    pub async fn record_build_failure(
        &self,
        _tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let error = match &issue.build_outcome {
            Some(BuildOutcome::Failure { error }) => error.clone(),
            _ => "build failed".to_string(),
        };
        let patch = IssuePatch::default()
            .set_error(error.clone())
            .set_pre_failure_state(issue.state)
            .clear_build_outcome();
        Ok(Some(ActionOutcome::new(IssueState::Failed, patch, error)))
    }

    /// Pause on a hard merge conflict signaled by the forge. A running
    /// build is cancelled; partial work stays on disk.
    pub async fn pause_on_conflict(
        &self,
        _tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        if issue.build_active {
            self.pool.cancel_and_wait(issue.id).await;
        }
        let patch = IssuePatch::default()
            .set_paused_from(issue.state)
            .set_build_active(false)
            .clear_merge_signal();
        Ok(Some(ActionOutcome::new(
            IssueState::Paused,
            patch,
            "merge conflict on change-request".to_string(),
        )))
    }
}

/// CR description derived from the approved plan and the commit series.
async fn cr_body(issue: &Issue, workspace: &std::path::Path) -> String {
    let mut body = String::new();
    if let Some(plan) = &issue.approved_plan {
        body.push_str(plan);
        body.push('\n');
    }
    let commits = workspace::commit_summary(workspace).await;
    if !commits.is_empty() {
        body.push_str("\n## Commits\n\n");
        body.push_str(&commits);
    }
    body
}

/// Prompt for a feedback build, rebuilt from the captured review comments.
pub(super) fn feedback_prompt(issue: &Issue) -> String {
    let comments: Vec<(u64, String)> = issue
        .feedback_comments
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();
    if comments.is_empty() {
        return "Address the review feedback on the open change-request.".to_string();
    }
    let mut prompt = String::from("Address the following review feedback:\n");
    for (_, body) in &comments {
        prompt.push_str("- ");
        prompt.push_str(body);
        prompt.push('\n');
    }
    prompt
}
