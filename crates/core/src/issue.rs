// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The central work item and its patch type.

use crate::build::BuildOutcome;
use crate::id::{IssueId, TenantId};
use crate::state::IssueState;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Signal recorded by the forge ingestor about a change-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeSignal {
    Merged,
    Conflict,
}

crate::enum_str! {
    MergeSignal {
        Merged => "merged",
        Conflict => "conflict",
    }
}

/// A single externally-authored work item, driven through the lifecycle by
/// the orchestrator. Mutated exclusively through store transitions and the
/// store's composite ingest operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub tenant_id: TenantId,
    /// Stable id assigned by the external tracker (dedupe key with tenant).
    pub external_id: String,
    /// Human-readable tracker identifier, e.g. `ABC-1`.
    pub identifier: String,
    pub title: String,
    pub description: String,
    /// Latest plan posted to the tracker (markdown).
    pub plan: Option<String>,
    /// Plan captured at approval; non-empty iff the issue ever reached
    /// `approved`.
    pub approved_plan: Option<String>,
    pub state: IssueState,
    /// Per-issue isolated directory (worktree + plan doc) while build
    /// states are reachable.
    pub workspace: Option<PathBuf>,
    /// Forge-assigned change-request id, once opened.
    pub change_request: Option<u64>,
    pub error: Option<String>,
    /// Set iff state is `failed`; target of an operator retry.
    pub pre_failure_state: Option<IssueState>,
    /// Set iff state is `paused`; target of an operator resume.
    pub paused_from: Option<IssueState>,
    pub refine_iterations: u32,
    pub build_attempts: u32,
    /// Highest tracker comment id already ingested.
    pub comment_cursor: u64,
    /// Highest forge review-comment id already ingested.
    pub review_cursor: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    /// True while a pool job owns this issue. Bounded by the pool size.
    pub build_active: bool,
    /// Pid of the code-generation subprocess, for the recovery sweep.
    pub build_pid: Option<u32>,
    /// Newest unprocessed tracker comment, staged by the tracker ingestor
    /// for the orchestrator's refining rules.
    pub pending_comment: Option<String>,
    /// Final build outcome delivered by the pool, consumed by the
    /// orchestrator on the next tick.
    pub build_outcome: Option<BuildOutcome>,
    /// Merge/conflict signal recorded by the forge ingestor.
    pub merge_signal: Option<MergeSignal>,
    /// True when a trusted reviewer requested changes.
    pub feedback_requested: bool,
    /// Trusted review comments captured for the feedback build, as JSON
    /// (id, body) pairs. Cleared after replies are posted.
    pub feedback_comments: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    pub last_tracker_check_ms: Option<u64>,
    pub last_forge_check_ms: Option<u64>,
}

impl Issue {
    /// Check if the issue is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Partial update applied atomically by `Store::transition`.
///
/// `None` leaves a column untouched; `Some(None)` clears a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuePatch {
    pub plan: Option<Option<String>>,
    pub approved_plan: Option<Option<String>>,
    pub workspace: Option<Option<PathBuf>>,
    pub change_request: Option<Option<u64>>,
    pub error: Option<Option<String>>,
    pub pre_failure_state: Option<Option<IssueState>>,
    pub paused_from: Option<Option<IssueState>>,
    pub refine_iterations: Option<u32>,
    pub build_attempts: Option<u32>,
    pub build_active: Option<bool>,
    pub build_pid: Option<Option<u32>>,
    pub pending_comment: Option<Option<String>>,
    pub build_outcome: Option<Option<BuildOutcome>>,
    pub merge_signal: Option<Option<MergeSignal>>,
    pub feedback_requested: Option<bool>,
    pub feedback_comments: Option<Option<String>>,
}

impl IssuePatch {
    crate::clearers! {
        clear_plan => plan,
        clear_approved_plan => approved_plan,
        clear_workspace => workspace,
        clear_change_request => change_request,
        clear_error => error,
        clear_pre_failure_state => pre_failure_state,
        clear_paused_from => paused_from,
        clear_build_pid => build_pid,
        clear_pending_comment => pending_comment,
        clear_build_outcome => build_outcome,
        clear_merge_signal => merge_signal,
        clear_feedback_comments => feedback_comments,
    }

    pub fn set_plan(mut self, v: impl Into<String>) -> Self {
        self.plan = Some(Some(v.into()));
        self
    }

    pub fn set_approved_plan(mut self, v: impl Into<String>) -> Self {
        self.approved_plan = Some(Some(v.into()));
        self
    }

    pub fn set_workspace(mut self, v: impl Into<PathBuf>) -> Self {
        self.workspace = Some(Some(v.into()));
        self
    }

    pub fn set_change_request(mut self, v: u64) -> Self {
        self.change_request = Some(Some(v));
        self
    }

    pub fn set_error(mut self, v: impl Into<String>) -> Self {
        self.error = Some(Some(v.into()));
        self
    }

    pub fn set_pre_failure_state(mut self, v: IssueState) -> Self {
        self.pre_failure_state = Some(Some(v));
        self
    }

    pub fn set_paused_from(mut self, v: IssueState) -> Self {
        self.paused_from = Some(Some(v));
        self
    }

    pub fn set_refine_iterations(mut self, v: u32) -> Self {
        self.refine_iterations = Some(v);
        self
    }

    pub fn set_build_attempts(mut self, v: u32) -> Self {
        self.build_attempts = Some(v);
        self
    }

    pub fn set_build_active(mut self, v: bool) -> Self {
        self.build_active = Some(v);
        self
    }

    pub fn set_build_pid(mut self, v: u32) -> Self {
        self.build_pid = Some(Some(v));
        self
    }

    pub fn set_feedback_requested(mut self, v: bool) -> Self {
        self.feedback_requested = Some(v);
        self
    }

    pub fn set_feedback_comments(mut self, v: impl Into<String>) -> Self {
        self.feedback_comments = Some(Some(v.into()));
        self
    }

    /// Apply this patch to an in-memory issue (the store re-reads the row
    /// inside the transaction and writes the patched copy back).
    pub fn apply(&self, issue: &mut Issue) {
        if let Some(v) = &self.plan {
            issue.plan.clone_from(v);
        }
        if let Some(v) = &self.approved_plan {
            issue.approved_plan.clone_from(v);
        }
        if let Some(v) = &self.workspace {
            issue.workspace.clone_from(v);
        }
        if let Some(v) = self.change_request {
            issue.change_request = v;
        }
        if let Some(v) = &self.error {
            issue.error.clone_from(v);
        }
        if let Some(v) = self.pre_failure_state {
            issue.pre_failure_state = v;
        }
        if let Some(v) = self.paused_from {
            issue.paused_from = v;
        }
        if let Some(v) = self.refine_iterations {
            issue.refine_iterations = v;
        }
        if let Some(v) = self.build_attempts {
            issue.build_attempts = v;
        }
        if let Some(v) = self.build_active {
            issue.build_active = v;
        }
        if let Some(v) = self.build_pid {
            issue.build_pid = v;
        }
        if let Some(v) = &self.pending_comment {
            issue.pending_comment.clone_from(v);
        }
        if let Some(v) = &self.build_outcome {
            issue.build_outcome.clone_from(v);
        }
        if let Some(v) = self.merge_signal {
            issue.merge_signal = v;
        }
        if let Some(v) = self.feedback_requested {
            issue.feedback_requested = v;
        }
        if let Some(v) = &self.feedback_comments {
            issue.feedback_comments.clone_from(v);
        }
    }
}

crate::builder! {
    pub struct IssueBuilder => Issue {
        into {
            external_id: String = "ext-1",
            identifier: String = "ABC-1",
            title: String = "test issue",
            description: String = "",
        }
        set {
            id: IssueId = IssueId(1),
            tenant_id: TenantId = TenantId(1),
            state: IssueState = IssueState::Queued,
            refine_iterations: u32 = 0,
            build_attempts: u32 = 0,
            comment_cursor: u64 = 0,
            review_cursor: u64 = 0,
            tokens_in: u64 = 0,
            tokens_out: u64 = 0,
            build_active: bool = false,
            feedback_requested: bool = false,
            created_at_ms: u64 = 1_000_000,
            updated_at_ms: u64 = 1_000_000,
        }
        option {
            plan: String = None,
            approved_plan: String = None,
            workspace: PathBuf = None,
            change_request: u64 = None,
            error: String = None,
            pre_failure_state: IssueState = None,
            paused_from: IssueState = None,
            build_pid: u32 = None,
            pending_comment: String = None,
            build_outcome: BuildOutcome = None,
            merge_signal: MergeSignal = None,
            feedback_comments: String = None,
            last_tracker_check_ms: u64 = None,
            last_forge_check_ms: u64 = None,
        }
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
