// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store error taxonomy.

use ralph_core::{IssueId, IssueState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite failure. Schema/constraint violations are
    /// programmer errors; transient I/O bubbles up to the action layer.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Optimistic-concurrency conflict on `transition`: the row's state no
    /// longer matches the expected `from` state. Benign — the orchestrator
    /// re-evaluates on the next tick.
    #[error("transition conflict on issue {issue}: expected {expected}, found {actual}")]
    Conflict {
        issue: IssueId,
        expected: IssueState,
        actual: IssueState,
    },

    /// The requested transition is not an edge of the lifecycle diagram.
    #[error("illegal transition on issue {issue}: {from} -> {to}")]
    IllegalTransition {
        issue: IssueId,
        from: IssueState,
        to: IssueState,
    },

    #[error("issue {0} not found")]
    IssueNotFound(IssueId),

    #[error("tenant {0:?} not found")]
    TenantNotFound(String),

    /// Build events may only be appended while the issue is building.
    #[error("issue {issue} is not in a build state (state: {state})")]
    NotBuilding { issue: IssueId, state: IssueState },

    /// A stored string column holds a value the current schema can't parse.
    #[error("corrupt column {column}: {value:?}")]
    CorruptColumn { column: &'static str, value: String },
}

impl StoreError {
    /// Conflicts are expected under concurrent evaluation and are not
    /// surfaced as action errors.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}
