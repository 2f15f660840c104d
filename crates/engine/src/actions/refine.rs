// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clarification actions: refine (plan generation) and approve.

use ralph_core::{ActivityKind, Issue, IssuePatch, IssueState, Tenant};
use ralph_gateways::{with_retry, CodegenGateway, ForgeGateway, TrackerGateway};

use super::{ActionOutcome, Actions};
use crate::error::EngineError;

impl<T, F, G> Actions<T, F, G>
where
    T: TrackerGateway,
    F: ForgeGateway,
    G: CodegenGateway,
{
    /// Generate (or iterate on) a plan and post it as a tracker comment.
    ///
    /// Declines when the worker produces an empty plan — the issue stays
    /// where it is and the miss is recorded as an action note.
    pub async fn refine(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let prompt = clarify_prompt(issue);
        let plan = with_retry(&self.config.retry, &self.cancel, || {
            self.codegen.plan(&prompt)
        })
        .await?;

        if plan.trim().is_empty() {
            self.store.append_activity(
                tenant.id,
                Some(issue.id),
                ActivityKind::ActionNote,
                "refine produced an empty plan, not transitioning",
            )?;
            return Ok(None);
        }

        with_retry(&self.config.retry, &self.cancel, || {
            self.tracker.post_comment(tenant, &issue.external_id, &plan)
        })
        .await?;

        let iteration = issue.refine_iterations + 1;
        let patch = IssuePatch::default()
            .set_plan(plan)
            .set_refine_iterations(iteration)
            .clear_pending_comment();
        Ok(Some(ActionOutcome::new(
            IssueState::Refining,
            patch,
            format!("plan v{} posted to tracker", iteration),
        )))
    }

    /// Capture the approved plan after the operator posted the marker.
    ///
    /// The approval applies to the latest posted plan; with no plan on
    /// record the approval is noted and ignored.
    pub async fn approve(
        &self,
        tenant: &Tenant,
        issue: &Issue,
    ) -> Result<Option<ActionOutcome>, EngineError> {
        let Some(plan) = issue.plan.clone().filter(|p| !p.trim().is_empty()) else {
            self.store.append_activity(
                tenant.id,
                Some(issue.id),
                ActivityKind::ActionNote,
                "approval marker seen but no plan posted yet",
            )?;
            return Ok(None);
        };

        let patch = IssuePatch::default()
            .set_approved_plan(plan)
            .clear_pending_comment();
        Ok(Some(ActionOutcome::new(
            IssueState::Approved,
            patch,
            "plan approved by operator".to_string(),
        )))
    }
}

/// Prompt for the clarification step: the issue text plus any operator
/// feedback on the previous plan.
fn clarify_prompt(issue: &Issue) -> String {
    let mut prompt = format!(
        "Produce a concise implementation plan in markdown.\n\n\
         Issue {}: {}\n\n{}\n",
        issue.identifier, issue.title, issue.description
    );
    if let Some(previous) = &issue.plan {
        prompt.push_str("\nPrevious plan:\n");
        prompt.push_str(previous);
        prompt.push('\n');
    }
    if let Some(comment) = &issue.pending_comment {
        prompt.push_str("\nOperator feedback:\n");
        prompt.push_str(comment);
        prompt.push('\n');
    }
    prompt
}
