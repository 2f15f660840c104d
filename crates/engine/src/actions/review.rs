// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Review-cycle actions: feedback dispatch, feedback completion, and
//! issue completion.

use ralph_core::{Issue, IssuePatch, IssueState, Tenant};
use ralph_gateways::{with_retry, CodegenGateway, ForgeGateway, TrackerGateway};

use super::build::feedback_prompt;
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
    /// Start a feedback build in the existing workspace after a trusted
    /// reviewer requested changes. Declines while the pool is full.
    pub async fn dispatch_feedback(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let Some(slot) = self.pool.try_reserve() else {
            return Ok(None);
        };
        let Some(ws) = issue.workspace.clone() else {
            return Err(EngineError::Workspace("issue in review has no workspace".into()));
        };

        let patch = IssuePatch::default()
            .set_build_active(true)
            .set_feedback_requested(false)
            .clear_build_outcome();
        let request = BuildRequest {
            slot,
            issue_id: issue.id,
            workspace: ws,
            prompt: feedback_prompt(issue),
            max_iterations: tenant.max_iterations,
        };
        Ok(Some(
            ActionOutcome::new(
                IssueState::AddressingFeedback,
                patch,
                "feedback build dispatched".to_string(),
            )
            .with_followup(request),
        ))
    }

    /// After a successful feedback build: push the update and acknowledge
    /// each captured review comment, keyed on forge comment ids.
    pub async fn finish_feedback(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let Some(ws) = issue.workspace.clone() else {
            return Err(EngineError::Workspace("feedback build has no workspace".into()));
        };
        let branch = workspace::branch_name(tenant, issue);

        with_retry(&self.config.retry, &self.cancel, || {
            self.forge.push_branch(tenant, &branch, &ws)
        })
        .await?;

        if let (Some(cr_id), Some(json)) = (issue.change_request, &issue.feedback_comments) {
            let comments: Vec<(u64, String)> =
                serde_json::from_str(json).unwrap_or_default();
            for (comment_id, _) in &comments {
                let comment_id = *comment_id;
                with_retry(&self.config.retry, &self.cancel, || {
                    self.forge.post_review_reply(
                        tenant,
                        cr_id,
                        comment_id,
                        "Addressed in the latest push.",
                    )
                })
                .await?;
            }
        }

        let patch = IssuePatch::default().clear_build_outcome().clear_feedback_comments();
        Ok(Some(ActionOutcome::new(
            IssueState::InReview,
            patch,
            "feedback addressed, update pushed".to_string(),
        )))
    }

    /// The change-request merged: clean the workspace and close out the
    /// tracker item.
    pub async fn complete(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        if let Some(ws) = &issue.workspace {
            workspace::remove(&self.config, ws).await?;
        }

        with_retry(&self.config.retry, &self.cancel, || {
            self.tracker.set_done(tenant, &issue.external_id)
        })
        .await?;

        let patch = IssuePatch::default().clear_workspace().clear_merge_signal();
        Ok(Some(ActionOutcome::new(
            IssueState::Completed,
            patch,
            "change-request merged, tracker item closed".to_string(),
        )))
    }
}
