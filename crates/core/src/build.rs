// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed build-event payloads streamed by the code-generation subprocess.

use crate::id::{BuildEventId, IssueId};
use serde::{Deserialize, Serialize};

/// One event on a build's live stream.
///
/// Serializes as `{"type": "tool_use", ...fields}`; unknown tags
/// deserialize to `Unknown` so a newer subprocess doesn't break replay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildPayload {
    /// The agent invoked a tool.
    ToolUse { name: String },
    /// A new invocation-loop iteration began.
    IterationStart { iteration: u32 },
    /// Work started on a named story/sub-task.
    StoryStarted { title: String },
    /// The quality-assurance phase changed.
    QaPhase { phase: String },
    /// One agent invocation finished, with its token spend.
    InvocationDone { tokens_in: u64, tokens_out: u64 },
    /// Provider usage limit hit; the loop pauses for `wait_ms`.
    UsageLimitWait { wait_ms: u64 },
    /// Free-form log line from the subprocess.
    LogMessage { message: String },
    /// Catch-all for unknown event types (forward compatibility).
    #[serde(other, skip_serializing)]
    Unknown,
}

impl BuildPayload {
    /// Short tag for activity logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolUse { .. } => "tool_use",
            Self::IterationStart { .. } => "iteration_start",
            Self::StoryStarted { .. } => "story_started",
            Self::QaPhase { .. } => "qa_phase",
            Self::InvocationDone { .. } => "invocation_done",
            Self::UsageLimitWait { .. } => "usage_limit_wait",
            Self::LogMessage { .. } => "log_message",
            Self::Unknown => "unknown",
        }
    }
}

/// Final status of a build job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BuildOutcome {
    Success,
    Failure { error: String },
}

impl BuildOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Append-only stored build event belonging to one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEventEntry {
    pub id: BuildEventId,
    pub issue_id: IssueId,
    pub payload: BuildPayload,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "build_tests.rs"]
mod tests;
