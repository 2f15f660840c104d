// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operator HTTP/WS surface.
//!
//! The WebSocket endpoint is a plain fan-out of the event bus: the store
//! commits first, publishes second, so a subscriber never sees an event
//! for a transition that is not durable. Slow consumers lose the oldest
//! events (bounded per-subscriber buffer).

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use ralph_core::{ActivityId, BuildEventId, EventBus, IssueId, TenantId};
use ralph_engine::{Control, EngineError};
use ralph_gateways::CodegenGateway;
use ralph_store::{Store, StoreError};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub struct AppState<G> {
    pub store: Arc<Store>,
    pub control: Arc<Control<G>>,
    pub bus: EventBus,
    pub cancel: CancellationToken,
}

impl<G> Clone for AppState<G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            control: Arc::clone(&self.control),
            bus: self.bus.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

pub fn router<G: CodegenGateway>(state: AppState<G>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/issues", get(list_issues::<G>))
        .route("/api/issues/{id}", get(get_issue::<G>))
        .route("/api/issues/{id}/activity", get(get_activity::<G>))
        .route("/api/issues/{id}/events", get(get_build_events::<G>))
        .route("/api/tenants", get(list_tenants::<G>))
        .route("/api/tenants/{id}/activity", get(get_tenant_activity::<G>))
        .route("/api/issues/{id}/pause", post(pause::<G>))
        .route("/api/issues/{id}/resume", post(resume::<G>))
        .route("/api/issues/{id}/retry", post(retry::<G>))
        .route("/ws/events", get(ws_events::<G>))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_issues<G: CodegenGateway>(
    State(state): State<AppState<G>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_issues()?))
}

async fn get_issue<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.get_issue(IssueId(id))?))
}

#[derive(Deserialize)]
struct ActivityPage {
    before: Option<i64>,
    #[serde(default = "default_limit")]
    limit: u32,
}

fn default_limit() -> u32 {
    50
}

async fn get_activity<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
    Query(page): Query<ActivityPage>,
) -> Result<impl IntoResponse, ApiError> {
    let entries =
        state
            .store
            .list_activity(IssueId(id), page.before.map(ActivityId), page.limit)?;
    Ok(Json(entries))
}

/// Tenants as stored; resolved secrets are memory-only and never appear
/// here.
async fn list_tenants<G: CodegenGateway>(
    State(state): State<AppState<G>>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.store.list_tenants()?))
}

async fn get_tenant_activity<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
    Query(page): Query<ActivityPage>,
) -> Result<impl IntoResponse, ApiError> {
    let entries = state.store.list_tenant_activity(
        TenantId(id),
        page.before.map(ActivityId),
        page.limit,
    )?;
    Ok(Json(entries))
}

#[derive(Deserialize)]
struct EventPage {
    after: Option<i64>,
    #[serde(default = "default_limit")]
    limit: u32,
}

/// Post-hoc replay of an issue's build events, oldest first.
async fn get_build_events<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
    Query(page): Query<EventPage>,
) -> Result<impl IntoResponse, ApiError> {
    let entries =
        state
            .store
            .list_build_events(IssueId(id), page.after.map(BuildEventId), page.limit)?;
    Ok(Json(entries))
}

async fn pause<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.control.pause(IssueId(id)).await?))
}

async fn resume<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.control.resume(IssueId(id)).await?))
}

async fn retry<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.control.retry(IssueId(id)).await?))
}

async fn ws_events<G: CodegenGateway>(
    State(state): State<AppState<G>>,
    upgrade: WebSocketUpgrade,
) -> Response {
    upgrade.on_upgrade(move |socket| stream_events(socket, state.bus, state.cancel))
}

/// Forward bus events to one WebSocket client until it disconnects or the
/// daemon shuts down.
async fn stream_events(socket: WebSocket, bus: EventBus, cancel: CancellationToken) {
    let (mut sink, mut stream) = socket.split();
    let mut events = bus.subscribe();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            incoming = stream.next() => match incoming {
                // Client went away (or sent a close frame).
                None | Some(Ok(Message::Close(_))) => return,
                Some(Err(_)) => return,
                Some(Ok(_)) => {}
            },
            event = events.recv() => match event {
                Ok(event) => {
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sink.send(Message::Text(json.into())).await.is_err() {
                        return;
                    }
                }
                // Slow consumer: oldest events were dropped, keep going.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!(dropped = n, "ws subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
            },
        }
    }
}

/// Uniform error mapping for the API.
struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, self.1).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IssueNotFound(_) | StoreError::TenantNotFound(_) => {
                ApiError(StatusCode::NOT_FOUND, err.to_string())
            }
            _ => ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidControl { .. } => ApiError(StatusCode::CONFLICT, err.to_string()),
            EngineError::Store(e) => ApiError::from(e),
            _ => ApiError(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
