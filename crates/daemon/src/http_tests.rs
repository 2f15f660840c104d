// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use ralph_engine::test_helpers::TestContext;
use tower::ServiceExt;

fn app(ctx: &TestContext) -> axum::Router {
    router(AppState {
        store: Arc::clone(&ctx.store),
        control: Arc::clone(&ctx.control),
        bus: ctx.bus.clone(),
        cancel: ctx.cancel.clone(),
    })
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn healthz_responds_ok() {
    let ctx = TestContext::new();
    let response = app(&ctx)
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn issues_are_listed_as_json() {
    let ctx = TestContext::new();
    ctx.seed_issue("ext-1", "ABC-1", "Add login");

    let response = app(&ctx)
        .oneshot(Request::get("/api/issues").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 1);
    assert_eq!(json[0]["identifier"], "ABC-1");
    assert_eq!(json[0]["state"], "queued");
}

#[tokio::test]
async fn unknown_issue_is_not_found() {
    let ctx = TestContext::new();
    let response = app(&ctx)
        .oneshot(Request::get("/api/issues/999").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pause_resume_round_trip_over_http() {
    let ctx = TestContext::new();
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    let path = format!("/api/issues/{}/pause", issue.id);

    let response = app(&ctx)
        .oneshot(Request::post(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["state"], "paused");

    // Pausing an already-paused issue is a conflict.
    let response = app(&ctx)
        .oneshot(Request::post(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let resume = format!("/api/issues/{}/resume", issue.id);
    let response = app(&ctx)
        .oneshot(Request::post(&resume).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["state"], "queued");
}

#[tokio::test]
async fn activity_endpoint_paginates() {
    let ctx = TestContext::new();
    let issue = ctx.seed_issue("ext-1", "ABC-1", "t");
    for n in 0..5 {
        ctx.store
            .append_activity(
                issue.tenant_id,
                Some(issue.id),
                ralph_core::ActivityKind::ActionNote,
                &format!("note {}", n),
            )
            .unwrap();
    }

    let path = format!("/api/issues/{}/activity?limit=2", issue.id);
    let response = app(&ctx)
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
    assert_eq!(json[0]["detail"], "note 4");

    let before = json[1]["id"].as_i64().unwrap();
    let path = format!("/api/issues/{}/activity?limit=2&before={}", issue.id, before);
    let response = app(&ctx)
        .oneshot(Request::get(&path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_json(response).await;
    assert_eq!(json[0]["detail"], "note 2");
}
