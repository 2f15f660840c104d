// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit records.

use crate::id::{ActivityId, IssueId, TenantId};
use serde::{Deserialize, Serialize};

/// Kind tag of an activity entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    StateChange,
    ExternalComment,
    BuildEvent,
    GatewayError,
    ActionNote,
    UntrustedFeedbackSkipped,
}

crate::enum_str! {
    ActivityKind {
        StateChange => "state_change",
        ExternalComment => "external_comment",
        BuildEvent => "build_event",
        GatewayError => "gateway_error",
        ActionNote => "action_note",
        UntrustedFeedbackSkipped => "untrusted_feedback_skipped",
    }
}

impl ActivityKind {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "state_change" => Self::StateChange,
            "external_comment" => Self::ExternalComment,
            "build_event" => Self::BuildEvent,
            "gateway_error" => Self::GatewayError,
            "action_note" => Self::ActionNote,
            "untrusted_feedback_skipped" => Self::UntrustedFeedbackSkipped,
            _ => return None,
        })
    }
}

/// One audit record. Never mutated after insertion.
///
/// `issue_id` is absent for tenant-level entries (e.g. an ingest cycle that
/// failed before any issue existed).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: ActivityId,
    pub tenant_id: TenantId,
    pub issue_id: Option<IssueId>,
    pub kind: ActivityKind,
    pub detail: String,
    pub created_at_ms: u64,
}

#[cfg(test)]
#[path = "activity_tests.rs"]
mod tests;
