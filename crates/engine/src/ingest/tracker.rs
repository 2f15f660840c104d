// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tracker ingestor: pulls newly assigned items and refinement comments.

use std::collections::HashMap;
use std::sync::Arc;

use ralph_core::{ActivityKind, Issue, Tenant, TenantId};
use ralph_gateways::{with_retry, TrackerGateway};
use ralph_store::Store;
use tokio_util::sync::CancellationToken;

use super::jittered;
use crate::config::EngineConfig;
use crate::error::EngineError;

pub struct TrackerIngestor<T> {
    store: Arc<Store>,
    tracker: Arc<T>,
    tenants: Arc<HashMap<TenantId, Tenant>>,
    config: Arc<EngineConfig>,
    cancel: CancellationToken,
}

impl<T: TrackerGateway> TrackerIngestor<T> {
    pub fn new(
        store: Arc<Store>,
        tracker: Arc<T>,
        tenants: Arc<HashMap<TenantId, Tenant>>,
        config: Arc<EngineConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self { store, tracker, tenants, config, cancel }
    }

    /// Poll until cancellation; exits between cycles.
    pub async fn run(&self) {
        loop {
            self.cycle().await;
            tokio::select! {
                _ = self.cancel.cancelled() => return,
                _ = tokio::time::sleep(jittered(self.config.poll_interval)) => {}
            }
        }
    }

    /// One ingest cycle over all tenants. A tenant's failure is logged
    /// against that tenant and does not abort the others.
    pub async fn cycle(&self) {
        for tenant in self.tenants.values() {
            if self.cancel.is_cancelled() {
                return;
            }
            if let Err(e) = self.cycle_tenant(tenant).await {
                tracing::warn!(tenant = %tenant.name, error = %e, "tracker ingest cycle failed");
                if let Err(e) = self.store.append_activity(
                    tenant.id,
                    None,
                    ActivityKind::GatewayError,
                    &format!("tracker poll failed: {}", e),
                ) {
                    tracing::error!(tenant = %tenant.name, error = %e, "failed to log ingest error");
                }
            }
        }
    }

    async fn cycle_tenant(&self, tenant: &Tenant) -> Result<(), EngineError> {
        // Re-read the cursor each cycle; it advances only after a page has
        // been durably observed, so a crash replays the page.
        let cursor = self.store.get_tenant(tenant.id)?.tracker_cursor;

        let (items, next_cursor) = with_retry(&self.config.retry, &self.cancel, || {
            self.tracker.list_assigned(tenant, cursor.as_deref())
        })
        .await?;

        for item in items {
            if !tenant.accepts_labels(&item.labels) {
                continue;
            }
            self.store.create_issue_if_absent(
                tenant.id,
                &item.external_id,
                &item.identifier,
                &item.title,
                &item.description,
            )?;
        }

        if let Some(next) = next_cursor {
            if Some(next.as_str()) != cursor.as_deref() {
                self.store.set_tracker_cursor(tenant.id, &next)?;
            }
        }

        // Surface new comments on issues awaiting clarification.
        for issue in self.store.issues_refining_for_tenant(tenant.id)? {
            if let Err(e) = self.poll_comments(tenant, &issue).await {
                tracing::warn!(issue_id = %issue.id, error = %e, "comment poll failed");
                self.store.append_activity(
                    tenant.id,
                    Some(issue.id),
                    ActivityKind::GatewayError,
                    &format!("comment poll failed: {}", e),
                )?;
            }
        }
        Ok(())
    }

    async fn poll_comments(&self, tenant: &Tenant, issue: &Issue) -> Result<(), EngineError> {
        let comments = with_retry(&self.config.retry, &self.cancel, || {
            self.tracker
                .get_comments(tenant, &issue.external_id, issue.comment_cursor)
        })
        .await?;

        if comments.is_empty() {
            self.store.touch_tracker_check(issue.id)?;
            return Ok(());
        }
        for comment in comments {
            self.store.record_tracker_comment(issue.id, comment.id, &comment.body)?;
        }
        Ok(())
    }
}
