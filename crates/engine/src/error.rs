// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use ralph_core::{IssueId, IssueState};
use ralph_gateways::GatewayError;
use ralph_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("workspace error: {0}")]
    Workspace(String),

    #[error("issue {issue} cannot {action} from state {state}")]
    InvalidControl {
        issue: IssueId,
        action: &'static str,
        state: IssueState,
    },
}

impl EngineError {
    /// Benign store conflicts are dropped by the orchestrator, not failed.
    pub fn is_conflict(&self) -> bool {
        matches!(self, EngineError::Store(e) if e.is_conflict())
    }
}
