// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition actions.
//!
//! Each action inspects one issue and returns a proposed transition
//! `(to_state, patch, activity detail)` — or declines. Actions never write
//! the store directly; the orchestrator applies the proposal atomically
//! via `Store::transition`. Gateway calls always go through the retry
//! envelope.

mod build;
mod refine;
mod review;

use std::sync::Arc;

use ralph_core::{IssuePatch, IssueState};
use ralph_gateways::{CodegenGateway, ForgeGateway, TrackerGateway};
use ralph_store::Store;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::pool::{BuildPool, BuildRequest};

/// A proposed transition, applied by the orchestrator.
///
/// `followup` carries a reserved pool job to spawn after the transition
/// commits — builds must not start before the issue row says `building`.
pub struct ActionOutcome {
    pub to: IssueState,
    pub patch: IssuePatch,
    pub detail: String,
    pub followup: Option<BuildRequest>,
}

impl ActionOutcome {
    pub fn new(to: IssueState, patch: IssuePatch, detail: impl Into<String>) -> Self {
        Self { to, patch, detail: detail.into(), followup: None }
    }

    pub fn with_followup(mut self, followup: BuildRequest) -> Self {
        self.followup = Some(followup);
        self
    }
}

/// Shared dependencies for all actions.
pub struct Actions<T, F, G> {
    pub(crate) store: Arc<Store>,
    pub(crate) tracker: Arc<T>,
    pub(crate) forge: Arc<F>,
    pub(crate) codegen: Arc<G>,
    pub(crate) pool: Arc<BuildPool<G>>,
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) cancel: CancellationToken,
}

impl<T, F, G> Actions<T, F, G>
where
    T: TrackerGateway,
    F: ForgeGateway,
    G: CodegenGateway,
{
    pub fn new(
        store: Arc<Store>,
        tracker: Arc<T>,
        forge: Arc<F>,
        codegen: Arc<G>,
        pool: Arc<BuildPool<G>>,
        config: Arc<EngineConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self { store, tracker, forge, codegen, pool, config, cancel }
    }
}

#[cfg(test)]
#[path = "../actions_tests.rs"]
mod tests;
