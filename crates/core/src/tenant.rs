// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tenant: one (tracker stream, forge repo) binding with credentials and
//! defaults. Created at startup from external config, never mutated by the
//! core.

use crate::id::TenantId;
use serde::{Deserialize, Serialize};

/// Default branch prefix for issue workspaces.
pub const DEFAULT_BRANCH_PREFIX: &str = "ralph/";

/// Default approval marker looked for in tracker comments.
pub const DEFAULT_APPROVAL_MARKER: &str = "@autoralph approved";

/// Default cap on code-generation iterations per build.
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    /// Unique tenant name (config key).
    pub name: String,
    /// Forge repository, e.g. `acme/storefront`.
    pub forge_repo: String,
    /// Base branch change-requests target.
    pub base_branch: String,
    /// Prefix for per-issue branches, e.g. `ralph/` → `ralph/ABC-1`.
    pub branch_prefix: String,
    /// Only tracker items carrying this label are ingested, when set.
    pub label_filter: Option<String>,
    /// Reviews from any other reviewer id are recorded and skipped, when set.
    /// Non-zero by construction (config validation).
    pub trusted_reviewer: Option<u64>,
    /// Substring in a tracker comment that signals plan sign-off.
    pub approval_marker: String,
    /// Iteration cap handed to the code-generation gateway.
    pub max_iterations: u32,
    /// Opaque tracker paging cursor, advanced per ingest cycle.
    pub tracker_cursor: Option<String>,
    /// Resolved at startup from env/profile; never persisted.
    #[serde(skip)]
    pub tracker_token: String,
    #[serde(skip)]
    pub forge_token: String,
}

impl Tenant {
    /// Check whether a tracker comment signals approval of the posted plan.
    ///
    /// Case-insensitive substring match on the tenant's configured marker.
    pub fn is_approval(&self, comment: &str) -> bool {
        comment.to_lowercase().contains(&self.approval_marker.to_lowercase())
    }

    /// Check whether a tracker item passes the tenant's label filter.
    pub fn accepts_labels(&self, labels: &[String]) -> bool {
        match &self.label_filter {
            Some(wanted) => labels.iter().any(|l| l == wanted),
            None => true,
        }
    }

    /// Check whether a reviewer id may trigger feedback.
    pub fn is_trusted_reviewer(&self, reviewer_id: u64) -> bool {
        match self.trusted_reviewer {
            Some(trusted) => reviewer_id == trusted,
            None => true,
        }
    }
}

crate::builder! {
    pub struct TenantBuilder => Tenant {
        into {
            name: String = "acme",
            forge_repo: String = "acme/storefront",
            base_branch: String = "main",
            branch_prefix: String = DEFAULT_BRANCH_PREFIX,
            approval_marker: String = DEFAULT_APPROVAL_MARKER,
            tracker_token: String = "tracker-token",
            forge_token: String = "forge-token",
        }
        set {
            id: TenantId = TenantId(1),
            max_iterations: u32 = DEFAULT_MAX_ITERATIONS,
        }
        option {
            label_filter: String = None,
            trusted_reviewer: u64 = None,
            tracker_cursor: String = None,
        }
    }
}

#[cfg(test)]
#[path = "tenant_tests.rs"]
mod tests;
