// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forge gateway: change-request verbs over the source-code forge.

use async_trait::async_trait;
use ralph_core::Tenant;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::GatewayError;
use crate::tracker::check_status;

/// Review verdict on a change-request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    ChangesRequested,
    Commented,
}

/// Latest review on a change-request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Review {
    pub verdict: ReviewVerdict,
    pub reviewer_id: u64,
}

/// Polled state of a change-request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CrStatus {
    pub merged: bool,
    /// `Some(false)` signals a hard merge conflict.
    #[serde(default)]
    pub mergeable: Option<bool>,
    #[serde(default)]
    pub latest_review: Option<Review>,
}

/// A review comment on a change-request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ReviewComment {
    /// Forge-assigned id; the dedupe key across polls.
    pub id: u64,
    pub reviewer_id: u64,
    pub body: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Verbs the core needs from the forge.
#[async_trait]
pub trait ForgeGateway: Send + Sync + 'static {
    /// Push a local branch to the tenant's repository.
    async fn push_branch(
        &self,
        tenant: &Tenant,
        branch: &str,
        local_path: &Path,
    ) -> Result<(), GatewayError>;

    /// Open a change-request and return its forge-assigned id.
    async fn open_change_request(
        &self,
        tenant: &Tenant,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<u64, GatewayError>;

    async fn get_cr_status(&self, tenant: &Tenant, cr_id: u64)
        -> Result<CrStatus, GatewayError>;

    /// Review comments with ids above `since_id`.
    async fn get_new_review_comments(
        &self,
        tenant: &Tenant,
        cr_id: u64,
        since_id: u64,
    ) -> Result<Vec<ReviewComment>, GatewayError>;

    /// Reply to one review comment.
    async fn post_review_reply(
        &self,
        tenant: &Tenant,
        cr_id: u64,
        parent_comment_id: u64,
        body: &str,
    ) -> Result<(), GatewayError>;
}

/// Default per-call deadline for forge requests.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Thin REST client for the forge API. `push_branch` shells out to git in
/// the workspace, since pushes are a git-protocol operation.
pub struct HttpForge {
    client: reqwest::Client,
    base_url: String,
}

impl HttpForge {
    pub fn new(base_url: impl Into<String>) -> Result<Self, GatewayError> {
        Self::with_deadline(base_url, DEFAULT_DEADLINE)
    }

    pub fn with_deadline(
        base_url: impl Into<String>,
        deadline: Duration,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(deadline)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn repo_url(&self, tenant: &Tenant, path: &str) -> String {
        format!("{}/api/repos/{}{}", self.base_url, tenant.forge_repo, path)
    }
}

#[derive(Deserialize)]
struct OpenedCr {
    id: u64,
}

#[async_trait]
impl ForgeGateway for HttpForge {
    async fn push_branch(
        &self,
        _tenant: &Tenant,
        branch: &str,
        local_path: &Path,
    ) -> Result<(), GatewayError> {
        let output = tokio::process::Command::new("git")
            .args(["-C", &local_path.display().to_string(), "push", "--force-with-lease", "origin", branch])
            .env_remove("GIT_DIR")
            .env_remove("GIT_WORK_TREE")
            .output()
            .await
            .map_err(|e| GatewayError::Subprocess(format!("git push spawn failed: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GatewayError::Subprocess(format!(
                "git push failed: {}",
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn open_change_request(
        &self,
        tenant: &Tenant,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<u64, GatewayError> {
        let resp = self
            .client
            .post(self.repo_url(tenant, "/pulls"))
            .bearer_auth(&tenant.forge_token)
            .json(&serde_json::json!({
                "head": head,
                "base": base,
                "title": title,
                "body": body,
            }))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let opened: OpenedCr = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(opened.id)
    }

    async fn get_cr_status(
        &self,
        tenant: &Tenant,
        cr_id: u64,
    ) -> Result<CrStatus, GatewayError> {
        let resp = self
            .client
            .get(self.repo_url(tenant, &format!("/pulls/{}", cr_id)))
            .bearer_auth(&tenant.forge_token)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn get_new_review_comments(
        &self,
        tenant: &Tenant,
        cr_id: u64,
        since_id: u64,
    ) -> Result<Vec<ReviewComment>, GatewayError> {
        let resp = self
            .client
            .get(self.repo_url(tenant, &format!("/pulls/{}/comments", cr_id)))
            .query(&[("since", since_id.to_string())])
            .bearer_auth(&tenant.forge_token)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn post_review_reply(
        &self,
        tenant: &Tenant,
        cr_id: u64,
        parent_comment_id: u64,
        body: &str,
    ) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(self.repo_url(
                tenant,
                &format!("/pulls/{}/comments/{}/replies", cr_id, parent_comment_id),
            ))
            .bearer_auth(&tenant.forge_token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }
}
