// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: toml file, CLI overrides, and credential
//! resolution into a validated tenant set.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ralph_core::tenant::{
    DEFAULT_APPROVAL_MARKER, DEFAULT_BRANCH_PREFIX, DEFAULT_MAX_ITERATIONS,
};
use ralph_engine::{EngineConfig, WorkspaceKind};
use ralph_gateways::{resolve_secret, CredentialError, Profiles};
use ralph_store::TenantConfig;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no tenants configured")]
    NoTenants,

    #[error("tenant {tenant:?}: trusted_reviewer must be non-zero")]
    ZeroTrustedReviewer { tenant: String },

    #[error("tenant {tenant:?}: {source}")]
    Credential {
        tenant: String,
        source: CredentialError,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDaemon {
    addr: Option<String>,
    state_dir: Option<PathBuf>,
    log_file: Option<PathBuf>,
    pool_size: Option<usize>,
    poll_interval_secs: Option<u64>,
    tick_interval_ms: Option<u64>,
    shutdown_grace_secs: Option<u64>,
    codegen_command: Option<String>,
    tracker_base_url: Option<String>,
    forge_base_url: Option<String>,
    /// Repository checkout worktrees branch from; absent means plain
    /// folder workspaces.
    repo_root: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCredentials {
    #[serde(default)]
    tracker: Profiles,
    #[serde(default)]
    forge: Profiles,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTenant {
    name: String,
    forge_repo: String,
    base_branch: Option<String>,
    branch_prefix: Option<String>,
    label_filter: Option<String>,
    trusted_reviewer: Option<u64>,
    approval_marker: Option<String>,
    max_iterations: Option<u32>,
    /// Named credential profiles; `default` applies when absent.
    tracker_profile: Option<String>,
    forge_profile: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    daemon: RawDaemon,
    #[serde(default)]
    credentials: RawCredentials,
    #[serde(default, rename = "tenant")]
    tenants: Vec<RawTenant>,
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    pub state_dir: PathBuf,
    pub log_file: Option<PathBuf>,
    pub codegen_command: String,
    pub tracker_base_url: String,
    pub forge_base_url: String,
    pub engine: EngineConfig,
    pub tenants: Vec<TenantConfig>,
}

/// CLI overrides applied on top of the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub addr: Option<String>,
    pub state_dir: Option<PathBuf>,
    pub tracker_base_url: Option<String>,
    pub forge_base_url: Option<String>,
}

impl Config {
    /// Load and validate the config file, resolving every tenant's
    /// secrets. A missing credential for any configured tenant is fatal.
    pub fn load(path: &Path, overrides: Overrides) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text, overrides)
    }

    pub fn from_toml(text: &str, overrides: Overrides) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text)?;
        if raw.tenants.is_empty() {
            return Err(ConfigError::NoTenants);
        }

        let mut tenants = Vec::with_capacity(raw.tenants.len());
        for tenant in &raw.tenants {
            if tenant.trusted_reviewer == Some(0) {
                return Err(ConfigError::ZeroTrustedReviewer { tenant: tenant.name.clone() });
            }
            let tracker_token = resolve_tenant_secret(
                &tenant.name,
                "TRACKER",
                &raw.credentials.tracker,
                tenant.tracker_profile.as_deref(),
            )?;
            let forge_token = resolve_tenant_secret(
                &tenant.name,
                "FORGE",
                &raw.credentials.forge,
                tenant.forge_profile.as_deref(),
            )?;

            tenants.push(TenantConfig {
                name: tenant.name.clone(),
                forge_repo: tenant.forge_repo.clone(),
                base_branch: tenant.base_branch.clone().unwrap_or_else(|| "main".to_string()),
                branch_prefix: tenant
                    .branch_prefix
                    .clone()
                    .unwrap_or_else(|| DEFAULT_BRANCH_PREFIX.to_string()),
                label_filter: tenant.label_filter.clone(),
                trusted_reviewer: tenant.trusted_reviewer,
                approval_marker: tenant
                    .approval_marker
                    .clone()
                    .unwrap_or_else(|| DEFAULT_APPROVAL_MARKER.to_string()),
                max_iterations: tenant.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
                tracker_token,
                forge_token,
            });
        }

        let state_dir = overrides
            .state_dir
            .or(raw.daemon.state_dir)
            .unwrap_or_else(|| PathBuf::from("ralph-state"));

        let workspace_kind = if raw.daemon.repo_root.is_some() {
            WorkspaceKind::Worktree
        } else {
            WorkspaceKind::Folder
        };

        let engine = EngineConfig {
            workspace_root: state_dir.join("workspaces"),
            repo_root: raw.daemon.repo_root,
            workspace_kind,
            pool_size: raw.daemon.pool_size.unwrap_or(3),
            tick_interval: Duration::from_millis(raw.daemon.tick_interval_ms.unwrap_or(250)),
            poll_interval: Duration::from_secs(raw.daemon.poll_interval_secs.unwrap_or(30)),
            shutdown_grace: Duration::from_secs(raw.daemon.shutdown_grace_secs.unwrap_or(30)),
            retry: Default::default(),
        };

        Ok(Config {
            addr: overrides
                .addr
                .or(raw.daemon.addr)
                .unwrap_or_else(|| "127.0.0.1:7878".to_string()),
            state_dir,
            log_file: raw.daemon.log_file,
            codegen_command: raw
                .daemon
                .codegen_command
                .unwrap_or_else(|| "ralph-codegen".to_string()),
            tracker_base_url: overrides
                .tracker_base_url
                .or(raw.daemon.tracker_base_url)
                .unwrap_or_else(|| "https://tracker.invalid".to_string()),
            forge_base_url: overrides
                .forge_base_url
                .or(raw.daemon.forge_base_url)
                .unwrap_or_else(|| "https://forge.invalid".to_string()),
            engine,
            tenants,
        })
    }
}

/// Env var for a tenant secret: `RALPH_<NAME>_<KIND>_TOKEN`, uppercased
/// with dashes mapped to underscores.
fn tenant_env_var(tenant: &str, kind: &str) -> String {
    let name: String = tenant
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("RALPH_{}_{}_TOKEN", name, kind)
}

fn resolve_tenant_secret(
    tenant: &str,
    kind: &str,
    profiles: &HashMap<String, String>,
    profile: Option<&str>,
) -> Result<String, ConfigError> {
    resolve_secret(&tenant_env_var(tenant, kind), profiles, profile).map_err(|source| {
        ConfigError::Credential { tenant: tenant.to_string(), source }
    })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
