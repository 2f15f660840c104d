// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Forge ingestor: polls review verdicts and merge status for open
//! change-requests.

use std::collections::HashMap;
use std::sync::Arc;

use ralph_core::{ActivityKind, Issue, MergeSignal, Tenant, TenantId};
use ralph_gateways::{with_retry, ForgeGateway, ReviewVerdict};
use ralph_store::Store;
use tokio_util::sync::CancellationToken;

use super::jittered;
use crate::config::EngineConfig;
use crate::error::EngineError;

pub struct ForgeIngestor<F> {
    store: Arc<Store>,
    forge: Arc<F>,
    tenants: Arc<HashMap<TenantId, Tenant>>,
    config: Arc<EngineConfig>,
    cancel: CancellationToken,
}

impl<F: ForgeGateway> ForgeIngestor<F> {
    pub fn new(
        store: Arc<Store>,
        forge: Arc<F>,
        tenants: Arc<HashMap<TenantId, Tenant>>,
        config: Arc<EngineConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self { store, forge, tenants, config, cancel }
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

    /// One poll over every issue with an open change-request. Per-issue
    /// failures are recorded and skipped.
    pub async fn cycle(&self) {
        let issues = match self.store.issues_awaiting_forge() {
            Ok(issues) => issues,
            Err(e) => {
                tracing::error!(error = %e, "failed to list issues for forge poll");
                return;
            }
        };

        for issue in issues {
            if self.cancel.is_cancelled() {
                return;
            }
            let Some(tenant) = self.tenants.get(&issue.tenant_id) else {
                continue;
            };
            if let Err(e) = self.poll_issue(tenant, &issue).await {
                tracing::warn!(issue_id = %issue.id, error = %e, "forge poll failed");
                if let Err(e) = self.store.append_activity(
                    tenant.id,
                    Some(issue.id),
                    ActivityKind::GatewayError,
                    &format!("forge poll failed: {}", e),
                ) {
                    tracing::error!(issue_id = %issue.id, error = %e, "failed to log forge error");
                }
            }
        }
    }

    async fn poll_issue(&self, tenant: &Tenant, issue: &Issue) -> Result<(), EngineError> {
        let Some(cr_id) = issue.change_request else {
            return Ok(());
        };

        let status = with_retry(&self.config.retry, &self.cancel, || {
            self.forge.get_cr_status(tenant, cr_id)
        })
        .await?;

        if status.merged {
            self.store.record_merge_signal(issue.id, MergeSignal::Merged)?;
            return Ok(());
        }

        let mut changed = false;
        if let Some(review) = &status.latest_review {
            if review.verdict == ReviewVerdict::ChangesRequested {
                if tenant.is_trusted_reviewer(review.reviewer_id) {
                    changed |= self.ingest_feedback(tenant, issue, cr_id).await?;
                } else {
                    changed |= self.store.record_untrusted_review(issue.id, review.reviewer_id)?;
                }
            }
        }

        // A hard conflict pauses the issue for the operator to untangle.
        if status.mergeable == Some(false) {
            changed |= self.store.record_merge_signal(issue.id, MergeSignal::Conflict)?;
        }

        if !changed {
            self.store.touch_forge_check(issue.id)?;
        }
        Ok(())
    }

    /// Capture new review comments (deduplicated by forge id) and flag the
    /// feedback request. A review with no new comments triggers nothing.
    async fn ingest_feedback(
        &self,
        tenant: &Tenant,
        issue: &Issue,
        cr_id: u64,
    ) -> Result<bool, EngineError> {
        let comments = with_retry(&self.config.retry, &self.cancel, || {
            self.forge
                .get_new_review_comments(tenant, cr_id, issue.review_cursor)
        })
        .await?;

        let Some(max_id) = comments.iter().map(|c| c.id).max() else {
            return Ok(false);
        };

        let captured: Vec<(u64, String)> =
            comments.iter().map(|c| (c.id, c.body.clone())).collect();
        let json = serde_json::to_string(&captured).unwrap_or_default();
        Ok(self.store.record_feedback_request(issue.id, &json, max_id)?)
    }
}
