// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-issue workspace management (worktree or folder, plus the plan doc).

use std::path::{Path, PathBuf};

use ralph_core::{Issue, Tenant};

use crate::config::{EngineConfig, WorkspaceKind};
use crate::error::EngineError;

/// File the approved plan is written to inside the workspace; the build
/// subprocess reads it as its requirements document.
pub const PLAN_DOC: &str = "PLAN.md";

/// Branch name for an issue: `<prefix><identifier>`.
pub fn branch_name(tenant: &Tenant, issue: &Issue) -> String {
    format!("{}{}", tenant.branch_prefix, issue.identifier)
}

/// Directory for an issue's workspace under the configured root.
pub fn workspace_path(config: &EngineConfig, issue: &Issue) -> PathBuf {
    config.workspace_root.join(format!("issue-{}", issue.id))
}

/// Path of the plan doc inside a workspace.
pub fn plan_doc_path(workspace: &Path) -> PathBuf {
    workspace.join(PLAN_DOC)
}

/// Create the isolated workspace for an issue and write the plan doc.
///
/// Worktree mode creates a branch named `<prefix><identifier>` off the
/// repository root; folder mode just creates the directory. Re-dispatch
/// into an existing workspace only refreshes the plan doc.
pub async fn create(
    config: &EngineConfig,
    tenant: &Tenant,
    issue: &Issue,
    plan: &str,
) -> Result<PathBuf, EngineError> {
    let path = workspace_path(config, issue);

    if !path.exists() {
        match config.workspace_kind {
            WorkspaceKind::Worktree => {
                let repo_root = config.repo_root.as_ref().ok_or_else(|| {
                    EngineError::Workspace("repo_root required for worktree workspaces".into())
                })?;
                create_worktree(repo_root, &path, &branch_name(tenant, issue)).await?;
            }
            WorkspaceKind::Folder => {
                tokio::fs::create_dir_all(&path).await.map_err(|e| {
                    EngineError::Workspace(format!("failed to create workspace dir: {}", e))
                })?;
            }
        }
    }

    tokio::fs::write(plan_doc_path(&path), plan)
        .await
        .map_err(|e| EngineError::Workspace(format!("failed to write plan doc: {}", e)))?;

    Ok(path)
}

/// Remove an issue's workspace (on completion). Worktree mode detaches the
/// worktree first so the repository stays consistent.
pub async fn remove(config: &EngineConfig, workspace: &Path) -> Result<(), EngineError> {
    if !workspace.exists() {
        return Ok(());
    }

    if config.workspace_kind == WorkspaceKind::Worktree {
        if let Some(repo_root) = &config.repo_root {
            let output = tokio::process::Command::new("git")
                .args([
                    "-C",
                    &repo_root.display().to_string(),
                    "worktree",
                    "remove",
                    "--force",
                    &workspace.display().to_string(),
                ])
                .env_remove("GIT_DIR")
                .env_remove("GIT_WORK_TREE")
                .output()
                .await
                .map_err(|e| EngineError::Workspace(format!("git spawn failed: {}", e)))?;
            if output.status.success() {
                return Ok(());
            }
            // Fall through to plain removal (e.g. the worktree was already
            // pruned).
            tracing::warn!(
                workspace = %workspace.display(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "git worktree remove failed, deleting directory"
            );
        }
    }

    tokio::fs::remove_dir_all(workspace)
        .await
        .map_err(|e| EngineError::Workspace(format!("failed to remove workspace: {}", e)))
}

async fn create_worktree(
    repo_root: &Path,
    path: &Path,
    branch: &str,
) -> Result<(), EngineError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            EngineError::Workspace(format!("failed to create workspace parent: {}", e))
        })?;
    }

    let output = tokio::process::Command::new("git")
        .args([
            "-C",
            &repo_root.display().to_string(),
            "worktree",
            "add",
            "-b",
            branch,
            &path.display().to_string(),
        ])
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .await
        .map_err(|e| EngineError::Workspace(format!("git spawn failed: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::Workspace(format!(
            "git worktree add failed: {}",
            stderr.trim()
        )));
    }
    Ok(())
}

/// Summarize the commit series of a workspace branch for the CR body.
/// Returns an empty string outside a git checkout (folder mode).
pub async fn commit_summary(workspace: &Path) -> String {
    let output = tokio::process::Command::new("git")
        .args(["-C", &workspace.display().to_string(), "log", "--oneline", "@{upstream}..HEAD"])
        .env_remove("GIT_DIR")
        .env_remove("GIT_WORK_TREE")
        .output()
        .await;
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout).into_owned(),
        _ => String::new(),
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
