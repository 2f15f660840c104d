// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test context: real store, fake gateways, folder workspaces.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ralph_core::{EventBus, Issue, IssueId, IssueState, Tenant, TenantId};
use ralph_gateways::{FakeCodegen, FakeForge, FakeTracker, RetryPolicy};
use ralph_store::{Store, TenantConfig};
use tokio_util::sync::CancellationToken;

use crate::actions::Actions;
use crate::config::{EngineConfig, WorkspaceKind};
use crate::control::Control;
use crate::ingest::{ForgeIngestor, TrackerIngestor};
use crate::orchestrator::Orchestrator;
use crate::pool::BuildPool;

pub struct TestContext {
    pub store: Arc<Store>,
    pub bus: EventBus,
    pub tracker: Arc<FakeTracker>,
    pub forge: Arc<FakeForge>,
    pub codegen: Arc<FakeCodegen>,
    pub pool: Arc<BuildPool<FakeCodegen>>,
    pub orchestrator: Orchestrator<FakeTracker, FakeForge, FakeCodegen>,
    pub tracker_ingest: TrackerIngestor<FakeTracker>,
    pub forge_ingest: ForgeIngestor<FakeForge>,
    pub control: Arc<Control<FakeCodegen>>,
    pub tenant: Tenant,
    pub cancel: CancellationToken,
    // Held for the workspace root's lifetime.
    _dir: tempfile::TempDir,
}

pub struct TestContextBuilder {
    pool_size: usize,
    trusted_reviewer: Option<u64>,
    label_filter: Option<String>,
}

impl Default for TestContextBuilder {
    fn default() -> Self {
        Self { pool_size: 3, trusted_reviewer: Some(42), label_filter: None }
    }
}

impl TestContextBuilder {
    pub fn pool_size(mut self, n: usize) -> Self {
        self.pool_size = n;
        self
    }

    pub fn trusted_reviewer(mut self, id: Option<u64>) -> Self {
        self.trusted_reviewer = id;
        self
    }

    pub fn label_filter(mut self, label: &str) -> Self {
        self.label_filter = Some(label.to_string());
        self
    }

    pub fn build(self) -> TestContext {
        #[allow(clippy::unwrap_used)]
        let dir = tempfile::tempdir().unwrap();
        let bus = EventBus::new();
        #[allow(clippy::unwrap_used)]
        let store = Arc::new(Store::open_in_memory(bus.clone()).unwrap());

        #[allow(clippy::unwrap_used)]
        let tenant = store
            .upsert_tenant(&TenantConfig {
                name: "acme".to_string(),
                forge_repo: "acme/storefront".to_string(),
                base_branch: "main".to_string(),
                branch_prefix: "ralph/".to_string(),
                label_filter: self.label_filter,
                trusted_reviewer: self.trusted_reviewer,
                approval_marker: "@autoralph approved".to_string(),
                max_iterations: 10,
                tracker_token: "tt".to_string(),
                forge_token: "ft".to_string(),
            })
            .unwrap();

        let mut tenants = HashMap::new();
        tenants.insert(tenant.id, tenant.clone());
        let tenants = Arc::new(tenants);

        let config = Arc::new(EngineConfig {
            workspace_root: dir.path().join("workspaces"),
            repo_root: None,
            workspace_kind: WorkspaceKind::Folder,
            pool_size: self.pool_size,
            tick_interval: Duration::from_millis(250),
            poll_interval: Duration::from_secs(30),
            shutdown_grace: Duration::from_secs(1),
            retry: RetryPolicy::immediate(),
        });

        let tracker = Arc::new(FakeTracker::new());
        let forge = Arc::new(FakeForge::new());
        let codegen = Arc::new(FakeCodegen::new());
        let cancel = CancellationToken::new();

        let pool = Arc::new(BuildPool::new(
            Arc::clone(&codegen),
            Arc::clone(&store),
            self.pool_size,
        ));

        let actions = Actions::new(
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&forge),
            Arc::clone(&codegen),
            Arc::clone(&pool),
            Arc::clone(&config),
            cancel.clone(),
        );

        let orchestrator = Orchestrator::new(
            Arc::clone(&store),
            actions,
            Arc::clone(&pool),
            Arc::clone(&tenants),
            config.tick_interval,
            cancel.clone(),
        );

        let tracker_ingest = TrackerIngestor::new(
            Arc::clone(&store),
            Arc::clone(&tracker),
            Arc::clone(&tenants),
            Arc::clone(&config),
            cancel.clone(),
        );
        let forge_ingest = ForgeIngestor::new(
            Arc::clone(&store),
            Arc::clone(&forge),
            Arc::clone(&tenants),
            Arc::clone(&config),
            cancel.clone(),
        );
        let control = Arc::new(Control::new(Arc::clone(&store), Arc::clone(&pool)));

        TestContext {
            store,
            bus,
            tracker,
            forge,
            codegen,
            pool,
            orchestrator,
            tracker_ingest,
            forge_ingest,
            control,
            tenant,
            cancel,
            _dir: dir,
        }
    }
}

impl TestContext {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TestContextBuilder {
        TestContextBuilder::default()
    }

    /// Create an issue directly in the store (bypassing the ingestor).
    #[allow(clippy::unwrap_used)]
    pub fn seed_issue(&self, external_id: &str, identifier: &str, title: &str) -> Issue {
        let (issue, created) = self
            .store
            .create_issue_if_absent(self.tenant.id, external_id, identifier, title, "")
            .unwrap();
        assert!(created);
        issue
    }

    #[allow(clippy::unwrap_used)]
    pub fn issue(&self, id: IssueId) -> Issue {
        self.store.get_issue(id).unwrap()
    }

    /// Run orchestrator ticks until the issue settles in `state` or the
    /// timeout expires. Build jobs run between ticks.
    #[allow(clippy::panic)]
    pub async fn tick_until_state(&self, id: IssueId, state: IssueState) {
        for _ in 0..200 {
            #[allow(clippy::unwrap_used)]
            self.orchestrator.tick().await.unwrap();
            if self.issue(id).state == state {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!(
            "issue {} never reached {} (state: {})",
            id,
            state,
            self.issue(id).state
        );
    }

    /// Wait until the pool finished with the issue (flag cleared and an
    /// outcome recorded or the job cancelled).
    #[allow(clippy::panic)]
    pub async fn wait_build_settled(&self, id: IssueId) {
        for _ in 0..200 {
            let issue = self.issue(id);
            if !issue.build_active {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("build for issue {} never settled", id);
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
