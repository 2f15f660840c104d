// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue lifecycle states and the legal transition graph.

use serde::{Deserialize, Serialize};

/// Lifecycle state of an issue.
///
/// `Completed` is terminal; `Failed` is soft-terminal (an operator retry
/// restores the pre-failure state). `Paused` can be entered from any
/// non-terminal state and remembers where it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueState {
    Queued,
    Refining,
    Approved,
    Building,
    InReview,
    AddressingFeedback,
    Completed,
    Failed,
    Paused,
}

crate::enum_str! {
    IssueState {
        Queued => "queued",
        Refining => "refining",
        Approved => "approved",
        Building => "building",
        InReview => "in_review",
        AddressingFeedback => "addressing_feedback",
        Completed => "completed",
        Failed => "failed",
        Paused => "paused",
    }
}

impl IssueState {
    /// Parse the store's string representation.
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "queued" => Self::Queued,
            "refining" => Self::Refining,
            "approved" => Self::Approved,
            "building" => Self::Building,
            "in_review" => Self::InReview,
            "addressing_feedback" => Self::AddressingFeedback,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "paused" => Self::Paused,
            _ => return None,
        })
    }

    /// Check if the state is terminal (no transitions ever leave it).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the state is one where active work is being performed.
    ///
    /// Action errors in these states fail the issue; elsewhere they are
    /// logged only.
    pub fn is_active_work(&self) -> bool {
        matches!(
            self,
            Self::Queued
                | Self::Refining
                | Self::Approved
                | Self::Building
                | Self::InReview
                | Self::AddressingFeedback
        )
    }

    /// Check if a build job may be running in this state.
    pub fn is_build_state(&self) -> bool {
        matches!(self, Self::Building | Self::AddressingFeedback)
    }

    /// Check whether a direct transition `self → to` is a legal walk in the
    /// lifecycle diagram.
    ///
    /// Pause is reachable from any non-terminal state; resume and retry are
    /// validated against the stored `paused_from` / `pre_failure_state` by
    /// the caller, so here they admit any active target.
    pub fn may_transition_to(&self, to: IssueState) -> bool {
        use IssueState::*;
        if *self != Paused && !self.is_terminal() && to == Paused {
            return true;
        }
        match self {
            Queued => matches!(to, Refining | Failed),
            // Refining self-loops on each clarification iteration.
            Refining => matches!(to, Refining | Approved | Failed),
            Approved => matches!(to, Building | Failed),
            Building => matches!(to, Building | InReview | Failed),
            InReview => matches!(to, AddressingFeedback | Completed | Failed),
            AddressingFeedback => matches!(to, AddressingFeedback | InReview | Failed),
            // Resume restores the saved state; retry restores pre-failure.
            Paused => to.is_active_work(),
            Failed => to.is_active_work(),
            Completed => false,
        }
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
