// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Issue-tracker gateway: the fixed verb set the core depends on.

use async_trait::async_trait;
use ralph_core::Tenant;
use serde::Deserialize;
use std::time::Duration;

use crate::error::GatewayError;

/// A work item assigned to the daemon's tracker user.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerItem {
    /// Stable tracker-side id (dedupe key with the tenant).
    pub external_id: String,
    /// Human-readable identifier, e.g. `ABC-1`.
    pub identifier: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub assignee_id: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
}

/// A comment on a tracker item.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TrackerComment {
    /// Tracker-assigned id, monotonically increasing per item.
    pub id: u64,
    #[serde(default)]
    pub author: String,
    pub body: String,
}

/// Verbs the core needs from the issue tracker.
#[async_trait]
pub trait TrackerGateway: Send + Sync + 'static {
    /// Items newly assigned since the opaque paging cursor. Returns the
    /// items and the cursor to persist once they are durably observed.
    async fn list_assigned(
        &self,
        tenant: &Tenant,
        since_cursor: Option<&str>,
    ) -> Result<(Vec<TrackerItem>, Option<String>), GatewayError>;

    /// Comments on an item with ids above `since_id`.
    async fn get_comments(
        &self,
        tenant: &Tenant,
        external_id: &str,
        since_id: u64,
    ) -> Result<Vec<TrackerComment>, GatewayError>;

    /// Post a markdown comment on an item.
    async fn post_comment(
        &self,
        tenant: &Tenant,
        external_id: &str,
        body: &str,
    ) -> Result<(), GatewayError>;

    /// Mark an item done on the tracker.
    async fn set_done(&self, tenant: &Tenant, external_id: &str) -> Result<(), GatewayError>;
}

/// Default per-call deadline for tracker requests.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(60);

/// Thin REST client for the tracker API.
pub struct HttpTracker {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTracker {
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Deserialize)]
struct AssignedPage {
    items: Vec<TrackerItem>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[async_trait]
impl TrackerGateway for HttpTracker {
    async fn list_assigned(
        &self,
        tenant: &Tenant,
        since_cursor: Option<&str>,
    ) -> Result<(Vec<TrackerItem>, Option<String>), GatewayError> {
        let mut req = self
            .client
            .get(self.url("/api/items/assigned"))
            .bearer_auth(&tenant.tracker_token);
        if let Some(cursor) = since_cursor {
            req = req.query(&[("cursor", cursor)]);
        }
        let resp = req.send().await?;
        let resp = check_status(resp).await?;
        let page: AssignedPage = resp
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok((page.items, page.next_cursor))
    }

    async fn get_comments(
        &self,
        tenant: &Tenant,
        external_id: &str,
        since_id: u64,
    ) -> Result<Vec<TrackerComment>, GatewayError> {
        let resp = self
            .client
            .get(self.url(&format!("/api/items/{}/comments", external_id)))
            .query(&[("since", since_id.to_string())])
            .bearer_auth(&tenant.tracker_token)
            .send()
            .await?;
        let resp = check_status(resp).await?;
        resp.json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
    }

    async fn post_comment(
        &self,
        tenant: &Tenant,
        external_id: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(self.url(&format!("/api/items/{}/comments", external_id)))
            .bearer_auth(&tenant.tracker_token)
            .json(&serde_json::json!({ "body": body }))
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }

    async fn set_done(&self, tenant: &Tenant, external_id: &str) -> Result<(), GatewayError> {
        let resp = self
            .client
            .post(self.url(&format!("/api/items/{}/done", external_id)))
            .bearer_auth(&tenant.tracker_token)
            .send()
            .await?;
        check_status(resp).await.map(|_| ())
    }
}

/// Map a non-success response to `GatewayError::Status` with its body.
pub(crate) async fn check_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(GatewayError::Status { code: status.as_u16(), body })
}
