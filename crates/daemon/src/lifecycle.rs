// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: startup, recovery sweep, component tasks, and
//! bounded shutdown.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use fs2::FileExt;
use ralph_core::{EventBus, Tenant, TenantId};
use ralph_engine::{
    pool, Actions, BuildPool, Control, EngineError, ForgeIngestor, Orchestrator, TrackerIngestor,
};
use ralph_gateways::{GatewayError, HttpForge, HttpTracker, ProcessCodegen};
use ralph_store::{Store, StoreError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Config;
use crate::http::{self, AppState};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("another daemon holds the lock: {0}")]
    LockFailed(std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to bind {addr}: {source}")]
    BindFailed {
        addr: String,
        source: std::io::Error,
    },
}

/// Run the daemon until ctrl-c / SIGTERM. Returns on clean shutdown;
/// fatal init errors bubble up to the CLI as a non-zero exit.
pub async fn serve(config: Config) -> Result<(), LifecycleError> {
    // 1. State directory and exclusive lock — prevents a second daemon on
    // the same store.
    std::fs::create_dir_all(&config.state_dir)?;
    std::fs::create_dir_all(&config.engine.workspace_root)?;
    let lock_path = config.state_dir.join("ralph.lock");
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // 2. Store, bus, tenants.
    let bus = EventBus::new();
    let store = Arc::new(Store::open(&config.state_dir.join("ralph.db"), bus.clone())?);

    let mut tenants: HashMap<TenantId, Tenant> = HashMap::new();
    for tenant_config in &config.tenants {
        let tenant = store.upsert_tenant(tenant_config)?;
        info!(tenant = %tenant.name, repo = %tenant.forge_repo, "tenant configured");
        tenants.insert(tenant.id, tenant);
    }
    let tenants = Arc::new(tenants);

    // 3. Gateways.
    let tracker = Arc::new(HttpTracker::new(config.tracker_base_url.clone())?);
    let forge = Arc::new(HttpForge::new(config.forge_base_url.clone())?);
    let codegen = Arc::new(ProcessCodegen::new(config.codegen_command.clone()));

    // 4. Recovery sweep before anything can dispatch new builds.
    let recovered = pool::recover(&store)?;
    if recovered > 0 {
        warn!(count = recovered, "recovered interrupted builds from previous run");
    }

    // 5. Engine components.
    let engine_config = Arc::new(config.engine.clone());
    let cancel = CancellationToken::new();
    let build_pool = Arc::new(BuildPool::new(
        Arc::clone(&codegen),
        Arc::clone(&store),
        engine_config.pool_size,
    ));
    let actions = Actions::new(
        Arc::clone(&store),
        Arc::clone(&tracker),
        Arc::clone(&forge),
        Arc::clone(&codegen),
        Arc::clone(&build_pool),
        Arc::clone(&engine_config),
        cancel.clone(),
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        actions,
        Arc::clone(&build_pool),
        Arc::clone(&tenants),
        engine_config.tick_interval,
        cancel.clone(),
    );
    let tracker_ingest = TrackerIngestor::new(
        Arc::clone(&store),
        Arc::clone(&tracker),
        Arc::clone(&tenants),
        Arc::clone(&engine_config),
        cancel.clone(),
    );
    let forge_ingest = ForgeIngestor::new(
        Arc::clone(&store),
        Arc::clone(&forge),
        Arc::clone(&tenants),
        Arc::clone(&engine_config),
        cancel.clone(),
    );
    let control = Arc::new(Control::new(Arc::clone(&store), Arc::clone(&build_pool)));

    // 6. Bind the operator surface before spawning the loops, so a bind
    // failure is a clean init error.
    let listener = tokio::net::TcpListener::bind(&config.addr).await.map_err(|source| {
        LifecycleError::BindFailed { addr: config.addr.clone(), source }
    })?;
    info!(addr = %config.addr, "operator surface listening");

    let app = http::router(AppState {
        store: Arc::clone(&store),
        control,
        bus: bus.clone(),
        cancel: cancel.clone(),
    });
    let http_cancel = cancel.clone();
    let http_task = tokio::spawn(async move {
        let shutdown = async move { http_cancel.cancelled().await };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(shutdown).await {
            tracing::error!(error = %e, "http server failed");
        }
    });

    // 7. Long-running component tasks.
    let orchestrator_task = tokio::spawn(async move { orchestrator.run().await });
    let tracker_task = tokio::spawn(async move { tracker_ingest.run().await });
    let forge_task = tokio::spawn(async move { forge_ingest.run().await });

    info!("daemon started");

    // 8. Wait for a shutdown signal.
    wait_for_shutdown().await;
    info!("shutdown signal received");
    cancel.cancel();

    // 9. Bounded drain: pollers and the orchestrator exit between cycles;
    // builds get the grace window, then stay flagged for the next boot's
    // recovery sweep.
    build_pool.shutdown(config.engine.shutdown_grace).await;
    let _ = orchestrator_task.await;
    let _ = tracker_task.await;
    let _ = forge_task.await;
    let _ = http_task.await;

    fs2::FileExt::unlock(&lock_file)?;
    let _ = std::fs::remove_file(&lock_path);
    info!("daemon stopped");
    Ok(())
}

/// Resolve on SIGINT (ctrl-c) or SIGTERM.
async fn wait_for_shutdown() {
    use tokio::signal::unix::{signal, SignalKind};
    let ctrl_c = tokio::signal::ctrl_c();
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "no SIGTERM handler, waiting on ctrl-c only");
            let _ = ctrl_c.await;
        }
    }
}
