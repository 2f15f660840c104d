// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine tuning knobs.

use std::path::PathBuf;
use std::time::Duration;

use ralph_gateways::RetryPolicy;

/// How per-issue workspaces are materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkspaceKind {
    /// `git worktree add -b <branch>` off the deployment checkout.
    Worktree,
    /// Plain directory (tests and non-git deployments).
    Folder,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root under which one directory per issue is created.
    pub workspace_root: PathBuf,
    /// For `Worktree` mode: the repository checkout worktrees branch from.
    pub repo_root: Option<PathBuf>,
    pub workspace_kind: WorkspaceKind,
    /// Bound on concurrently running builds.
    pub pool_size: usize,
    /// Orchestrator rate limit: at most one tick per interval.
    pub tick_interval: Duration,
    /// Base poll interval for both ingestors (jittered ±10%).
    pub poll_interval: Duration,
    /// Grace window for shutdown before builds are force-killed.
    pub shutdown_grace: Duration,
    /// Backoff schedule for gateway calls.
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("workspaces"),
            repo_root: None,
            workspace_kind: WorkspaceKind::Worktree,
            pool_size: 3,
            tick_interval: Duration::from_millis(250),
            poll_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}
