// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable fake gateways for tests.
//!
//! Each fake records its calls and lets a test inject the next failure.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use ralph_core::{BuildOutcome, BuildPayload, Tenant};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::codegen::{BuildStream, CodegenGateway};
use crate::error::GatewayError;
use crate::forge::{CrStatus, ForgeGateway, ReviewComment};
use crate::tracker::{TrackerComment, TrackerGateway, TrackerItem};

// ---------------------------------------------------------------- tracker

#[derive(Default)]
struct TrackerState {
    items: Vec<TrackerItem>,
    comments: HashMap<String, Vec<TrackerComment>>,
    posted: Vec<(String, String)>,
    done: Vec<String>,
    fail_next: Option<GatewayError>,
    next_cursor: Option<String>,
}

/// Fake issue tracker with a scriptable assigned-item list.
#[derive(Clone, Default)]
pub struct FakeTracker {
    state: Arc<Mutex<TrackerState>>,
}

impl FakeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, item: TrackerItem) {
        self.state.lock().items.push(item);
    }

    /// Convenience: add a plain item with no labels.
    pub fn add_simple_item(&self, external_id: &str, identifier: &str, title: &str, desc: &str) {
        self.add_item(TrackerItem {
            external_id: external_id.to_string(),
            identifier: identifier.to_string(),
            title: title.to_string(),
            description: desc.to_string(),
            assignee_id: None,
            labels: Vec::new(),
        });
    }

    pub fn add_comment(&self, external_id: &str, id: u64, author: &str, body: &str) {
        self.state
            .lock()
            .comments
            .entry(external_id.to_string())
            .or_default()
            .push(TrackerComment { id, author: author.to_string(), body: body.to_string() });
    }

    /// Comments posted by the daemon, as (external_id, body).
    pub fn posted_comments(&self) -> Vec<(String, String)> {
        self.state.lock().posted.clone()
    }

    /// Items marked done by the daemon.
    pub fn done_items(&self) -> Vec<String> {
        self.state.lock().done.clone()
    }

    /// Fail the next call with the given error.
    pub fn fail_next(&self, err: GatewayError) {
        self.state.lock().fail_next = Some(err);
    }

    pub fn set_next_cursor(&self, cursor: &str) {
        self.state.lock().next_cursor = Some(cursor.to_string());
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.state.lock().fail_next.take()
    }
}

#[async_trait]
impl TrackerGateway for FakeTracker {
    async fn list_assigned(
        &self,
        _tenant: &Tenant,
        _since_cursor: Option<&str>,
    ) -> Result<(Vec<TrackerItem>, Option<String>), GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let state = self.state.lock();
        Ok((state.items.clone(), state.next_cursor.clone()))
    }

    async fn get_comments(
        &self,
        _tenant: &Tenant,
        external_id: &str,
        since_id: u64,
    ) -> Result<Vec<TrackerComment>, GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let state = self.state.lock();
        Ok(state
            .comments
            .get(external_id)
            .map(|comments| comments.iter().filter(|c| c.id > since_id).cloned().collect())
            .unwrap_or_default())
    }

    async fn post_comment(
        &self,
        _tenant: &Tenant,
        external_id: &str,
        body: &str,
    ) -> Result<(), GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state.lock().posted.push((external_id.to_string(), body.to_string()));
        Ok(())
    }

    async fn set_done(&self, _tenant: &Tenant, external_id: &str) -> Result<(), GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state.lock().done.push(external_id.to_string());
        Ok(())
    }
}

// ------------------------------------------------------------------ forge

#[derive(Default)]
struct ForgeState {
    statuses: HashMap<u64, CrStatus>,
    review_comments: HashMap<u64, Vec<ReviewComment>>,
    pushed: Vec<(String, PathBuf)>,
    opened: Vec<(String, String, String, String)>,
    replies: Vec<(u64, u64, String)>,
    fail_next: Option<GatewayError>,
    next_cr_id: u64,
}

/// Fake forge with scriptable change-request status.
#[derive(Clone)]
pub struct FakeForge {
    state: Arc<Mutex<ForgeState>>,
}

impl Default for FakeForge {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(ForgeState { next_cr_id: 100, ..Default::default() })),
        }
    }
}

impl FakeForge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, cr_id: u64, status: CrStatus) {
        self.state.lock().statuses.insert(cr_id, status);
    }

    pub fn add_review_comment(&self, cr_id: u64, comment: ReviewComment) {
        self.state.lock().review_comments.entry(cr_id).or_default().push(comment);
    }

    /// Branches pushed by the daemon, as (branch, local_path).
    pub fn pushed_branches(&self) -> Vec<(String, PathBuf)> {
        self.state.lock().pushed.clone()
    }

    /// Change-requests opened, as (head, base, title, body).
    pub fn opened_crs(&self) -> Vec<(String, String, String, String)> {
        self.state.lock().opened.clone()
    }

    /// Review replies posted, as (cr_id, parent_comment_id, body).
    pub fn replies(&self) -> Vec<(u64, u64, String)> {
        self.state.lock().replies.clone()
    }

    pub fn fail_next(&self, err: GatewayError) {
        self.state.lock().fail_next = Some(err);
    }

    fn take_failure(&self) -> Option<GatewayError> {
        self.state.lock().fail_next.take()
    }
}

#[async_trait]
impl ForgeGateway for FakeForge {
    async fn push_branch(
        &self,
        _tenant: &Tenant,
        branch: &str,
        local_path: &Path,
    ) -> Result<(), GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state.lock().pushed.push((branch.to_string(), local_path.to_path_buf()));
        Ok(())
    }

    async fn open_change_request(
        &self,
        _tenant: &Tenant,
        head: &str,
        base: &str,
        title: &str,
        body: &str,
    ) -> Result<u64, GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let mut state = self.state.lock();
        state.next_cr_id += 1;
        let id = state.next_cr_id;
        state.opened.push((
            head.to_string(),
            base.to_string(),
            title.to_string(),
            body.to_string(),
        ));
        state.statuses.insert(
            id,
            CrStatus { merged: false, mergeable: Some(true), latest_review: None },
        );
        Ok(id)
    }

    async fn get_cr_status(
        &self,
        _tenant: &Tenant,
        cr_id: u64,
    ) -> Result<CrStatus, GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state
            .lock()
            .statuses
            .get(&cr_id)
            .cloned()
            .ok_or(GatewayError::Status { code: 404, body: format!("no cr {}", cr_id) })
    }

    async fn get_new_review_comments(
        &self,
        _tenant: &Tenant,
        cr_id: u64,
        since_id: u64,
    ) -> Result<Vec<ReviewComment>, GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        let state = self.state.lock();
        Ok(state
            .review_comments
            .get(&cr_id)
            .map(|comments| comments.iter().filter(|c| c.id > since_id).cloned().collect())
            .unwrap_or_default())
    }

    async fn post_review_reply(
        &self,
        _tenant: &Tenant,
        cr_id: u64,
        parent_comment_id: u64,
        body: &str,
    ) -> Result<(), GatewayError> {
        if let Some(err) = self.take_failure() {
            return Err(err);
        }
        self.state.lock().replies.push((cr_id, parent_comment_id, body.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------- codegen

/// One scripted build for [`FakeCodegen`].
#[derive(Debug, Clone)]
pub struct ScriptedBuild {
    pub events: Vec<BuildPayload>,
    pub outcome: BuildOutcome,
    /// When set, the build never finishes on its own — it waits for
    /// cancellation (pause/shutdown tests).
    pub hold_until_cancel: bool,
}

impl ScriptedBuild {
    pub fn success(events: Vec<BuildPayload>) -> Self {
        Self { events, outcome: BuildOutcome::Success, hold_until_cancel: false }
    }

    pub fn failure(events: Vec<BuildPayload>, error: &str) -> Self {
        Self {
            events,
            outcome: BuildOutcome::Failure { error: error.to_string() },
            hold_until_cancel: false,
        }
    }

    pub fn hanging(events: Vec<BuildPayload>) -> Self {
        Self { events, outcome: BuildOutcome::Success, hold_until_cancel: true }
    }
}

#[derive(Default)]
struct CodegenState {
    plans: VecDeque<String>,
    builds: VecDeque<ScriptedBuild>,
    plan_prompts: Vec<String>,
    build_starts: Vec<(PathBuf, String, u32)>,
    fail_next: Option<GatewayError>,
}

/// Fake code-generation worker with scripted plans and builds.
#[derive(Clone, Default)]
pub struct FakeCodegen {
    state: Arc<Mutex<CodegenState>>,
}

impl FakeCodegen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the next plan response. When the queue is empty a canned plan
    /// is returned.
    pub fn push_plan(&self, plan: &str) {
        self.state.lock().plans.push_back(plan.to_string());
    }

    /// Queue the next build script. When the queue is empty the build
    /// succeeds with no events.
    pub fn push_build(&self, build: ScriptedBuild) {
        self.state.lock().builds.push_back(build);
    }

    pub fn fail_next(&self, err: GatewayError) {
        self.state.lock().fail_next = Some(err);
    }

    /// Prompts passed to `plan`.
    pub fn plan_prompts(&self) -> Vec<String> {
        self.state.lock().plan_prompts.clone()
    }

    /// Builds started, as (workspace, prompt, max_iterations).
    pub fn build_starts(&self) -> Vec<(PathBuf, String, u32)> {
        self.state.lock().build_starts.clone()
    }
}

#[async_trait]
impl CodegenGateway for FakeCodegen {
    async fn plan(&self, prompt: &str) -> Result<String, GatewayError> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_next.take() {
            return Err(err);
        }
        state.plan_prompts.push(prompt.to_string());
        Ok(state
            .plans
            .pop_front()
            .unwrap_or_else(|| "## Plan\n\n1. Implement the request".to_string()))
    }

    async fn start(
        &self,
        workspace: &Path,
        prompt: &str,
        max_iterations: u32,
    ) -> Result<BuildStream, GatewayError> {
        let script = {
            let mut state = self.state.lock();
            if let Some(err) = state.fail_next.take() {
                return Err(err);
            }
            state
                .build_starts
                .push((workspace.to_path_buf(), prompt.to_string(), max_iterations));
            state.builds.pop_front().unwrap_or_else(|| ScriptedBuild::success(Vec::new()))
        };

        let (event_tx, event_rx) = mpsc::channel(64);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        tokio::spawn(async move {
            for event in script.events {
                if event_tx.send(event).await.is_err() {
                    return;
                }
            }
            drop(event_tx);
            if script.hold_until_cancel {
                task_cancel.cancelled().await;
                let _ = outcome_tx
                    .send(BuildOutcome::Failure { error: "cancelled".to_string() });
                return;
            }
            let _ = outcome_tx.send(script.outcome);
        });

        Ok(BuildStream::new(None, event_rx, outcome_rx, cancel))
    }
}
