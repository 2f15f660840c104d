// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded worker pool for long-running build jobs.
//!
//! Each job owns one issue for the duration of the build: it consumes the
//! code-generation event stream, demultiplexes events to the store (which
//! publishes them on the bus) and the token counters, and records the
//! final outcome for the orchestrator to pick up on its next tick.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use ralph_core::{BuildOutcome, BuildPayload, IssueId, IssuePatch, IssueState};
use ralph_gateways::codegen::{pid_alive, send_sigterm};
use ralph_gateways::{BuildStream, CodegenGateway};
use ralph_store::Store;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;

/// A reserved pool slot. Dropping it releases the slot.
pub struct PoolSlot {
    _permit: OwnedSemaphorePermit,
}

/// A build job handed from the dispatch action to the pool, spawned only
/// after the dispatching transition commits.
pub struct BuildRequest {
    pub slot: PoolSlot,
    pub issue_id: IssueId,
    pub workspace: PathBuf,
    pub prompt: String,
    pub max_iterations: u32,
}

struct RunningJob {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct BuildPool<G> {
    codegen: Arc<G>,
    store: Arc<Store>,
    permits: Arc<Semaphore>,
    jobs: Mutex<HashMap<IssueId, RunningJob>>,
}

impl<G: CodegenGateway> BuildPool<G> {
    pub fn new(codegen: Arc<G>, store: Arc<Store>, size: usize) -> Self {
        Self {
            codegen,
            store,
            permits: Arc::new(Semaphore::new(size)),
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Reserve a slot, or `None` when the pool is full. Dispatch actions
    /// decline without a slot, leaving the issue queued in the store.
    pub fn try_reserve(&self) -> Option<PoolSlot> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| PoolSlot { _permit: permit })
    }

    /// Number of currently running jobs.
    pub fn running(&self) -> usize {
        self.jobs.lock().len()
    }

    /// Start a reserved build job. Called by the orchestrator after the
    /// dispatching transition committed.
    pub async fn spawn(self: &Arc<Self>, request: BuildRequest) {
        let BuildRequest { slot, issue_id, workspace, prompt, max_iterations } = request;

        let stream = match self.codegen.start(&workspace, &prompt, max_iterations).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(issue_id = %issue_id, error = %e, "build spawn failed");
                let outcome = BuildOutcome::Failure { error: format!("spawn failed: {}", e) };
                if let Err(e) = self.store.record_build_outcome(issue_id, &outcome) {
                    tracing::error!(issue_id = %issue_id, error = %e, "failed to record spawn failure");
                }
                drop(slot);
                return;
            }
        };

        if let Err(e) = self.store.set_build_started(issue_id, stream.pid) {
            tracing::error!(issue_id = %issue_id, error = %e, "failed to record build pid");
        }

        let cancel = stream.cancel_token();
        let pool = Arc::clone(self);
        let job_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            pool.run_job(issue_id, stream, job_cancel).await;
            pool.jobs.lock().remove(&issue_id);
            drop(slot);
        });

        self.jobs.lock().insert(issue_id, RunningJob { cancel, handle });
    }

    /// Consume a build's event stream until it ends or cancellation fires.
    async fn run_job(&self, issue_id: IssueId, mut stream: BuildStream, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Pause/shutdown: no outcome is recorded, partial work
                    // stays on disk for a later re-dispatch.
                    if let Err(e) = self.store.clear_build_active(issue_id) {
                        tracing::error!(issue_id = %issue_id, error = %e, "failed to clear build flag");
                    }
                    return;
                }
                event = stream.events.recv() => match event {
                    Some(payload) => self.handle_event(issue_id, payload, &cancel).await,
                    None => break,
                }
            }
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = self.store.clear_build_active(issue_id) {
                    tracing::error!(issue_id = %issue_id, error = %e, "failed to clear build flag");
                }
                return;
            }
            outcome = &mut stream.outcome => outcome.unwrap_or(BuildOutcome::Failure {
                error: "build stream ended unexpectedly".to_string(),
            }),
        };

        tracing::info!(
            issue_id = %issue_id,
            success = outcome.is_success(),
            "build finished"
        );
        if let Err(e) = self.store.record_build_outcome(issue_id, &outcome) {
            tracing::error!(issue_id = %issue_id, error = %e, "failed to record build outcome");
        }
    }

    async fn handle_event(
        &self,
        issue_id: IssueId,
        payload: BuildPayload,
        cancel: &CancellationToken,
    ) {
        if let Err(e) = self.store.append_build_event(issue_id, &payload) {
            tracing::warn!(issue_id = %issue_id, error = %e, "dropping build event");
        }

        match payload {
            BuildPayload::InvocationDone { tokens_in, tokens_out } => {
                if let Err(e) = self.store.increment_tokens(issue_id, tokens_in, tokens_out) {
                    tracing::error!(issue_id = %issue_id, error = %e, "failed to count tokens");
                }
            }
            BuildPayload::UsageLimitWait { wait_ms } => {
                // Pause consumption for the declared duration or until
                // cancellation, whichever is first.
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_millis(wait_ms)) => {}
                    _ = cancel.cancelled() => {}
                }
            }
            _ => {}
        }
    }

    /// Cancel a running job and wait for it to drain. No-op when the issue
    /// has no running job.
    pub async fn cancel_and_wait(&self, issue_id: IssueId) {
        let job = self.jobs.lock().remove(&issue_id);
        if let Some(job) = job {
            job.cancel.cancel();
            let _ = job.handle.await;
        }
    }

    /// Cancel everything and wait up to the grace window. Jobs that fail
    /// to drain are aborted with `build_active` left set, so the next
    /// boot's recovery sweep picks them up.
    pub async fn shutdown(&self, grace: Duration) {
        let jobs: Vec<(IssueId, RunningJob)> = self.jobs.lock().drain().collect();
        if jobs.is_empty() {
            return;
        }
        tracing::info!(count = jobs.len(), "cancelling running builds");
        for (_, job) in &jobs {
            job.cancel.cancel();
        }

        let drain = async {
            for (_, job) in jobs {
                let _ = job.handle.await;
            }
        };
        if tokio::time::timeout(grace, drain).await.is_err() {
            tracing::warn!("builds did not drain within the grace window");
        }
    }
}

/// Startup recovery sweep.
///
/// Every row still flagged `build_active` lost its job in a crash or
/// forced shutdown. A recorded subprocess that is somehow still alive is
/// terminated, and the issue fails with `interrupted` so the operator can
/// retry.
pub fn recover(store: &Store) -> Result<u32, EngineError> {
    let orphans = store.list_recoverable_builds()?;
    let mut recovered = 0;
    for issue in orphans {
        if let Some(pid) = issue.build_pid {
            if pid_alive(pid) {
                tracing::warn!(issue_id = %issue.id, pid, "terminating orphaned build subprocess");
                send_sigterm(pid);
            }
        }

        let patch = IssuePatch::default()
            .set_error("interrupted")
            .set_pre_failure_state(issue.state)
            .set_build_active(false)
            .clear_build_pid()
            .clear_build_outcome();
        match store.transition(issue.id, issue.state, IssueState::Failed, patch, "interrupted") {
            Ok(_) => recovered += 1,
            Err(e) => {
                tracing::error!(issue_id = %issue.id, error = %e, "recovery transition failed");
                // At minimum release the flag so the pool bound holds.
                store.clear_build_active(issue.id)?;
            }
        }
    }
    Ok(recovered)
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
