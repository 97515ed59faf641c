//! HTTP routes driven in-process through the router

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use common::Harness;
use onboard_server::AppState;
use onboard_server::api::build_app;
use onboard_server::identity::IdentityError;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app(h: &Harness) -> Router {
    build_app(AppState::with_parts(h.dyn_store(), h.dyn_identity()))
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn submission(email: &str) -> Value {
    json!({
        "organization_name": "Acme Corp",
        "email": email,
        "role": "admin",
    })
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let (status, body) = call(&app(&h), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_submit_list_approve() {
    let h = Harness::new();
    let app = app(&h);

    let (status, body) = call(&app, "POST", "/api/onboarding", Some(submission("api@acme.com"))).await;
    assert_eq!(status, StatusCode::OK);
    let request_id = body["data"]["request_id"].as_str().unwrap().to_string();

    let (status, body) = call(&app, "GET", "/api/onboarding", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["status"], "pending");

    let (status, body) = call(
        &app,
        "POST",
        "/api/onboarding/approve",
        Some(json!({ "request_id": request_id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "api@acme.com");

    let (status, body) = call(&app, "GET", "/api/onboarding?state=active", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["request_id"], request_id.as_str());

    let (status, body) = call(&app, "GET", &format!("/api/onboarding/{request_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
}

#[tokio::test]
async fn test_duplicate_submission_conflicts() {
    let h = Harness::new();
    let app = app(&h);
    call(&app, "POST", "/api/onboarding", Some(submission("dup@acme.com"))).await;

    let (status, body) = call(&app, "POST", "/api/onboarding", Some(submission("dup@acme.com"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 3101);
}

#[tokio::test]
async fn test_invalid_submission_rejected() {
    let h = Harness::new();
    let (status, _) = call(
        &app(&h),
        "POST",
        "/api/onboarding",
        Some(json!({ "organization_name": "Acme", "email": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_state_filter_rejected() {
    let h = Harness::new();
    let (status, _) = call(&app(&h), "GET", "/api/onboarding?state=sleeping", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_approve_unknown_request() {
    let h = Harness::new();
    let (status, body) = call(
        &app(&h),
        "POST",
        "/api/onboarding/approve",
        Some(json!({ "request_id": "missing" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 3102);
}

#[tokio::test]
async fn test_identity_failure_then_retry() {
    let h = Harness::new();
    let app = app(&h);
    let (_, body) = call(&app, "POST", "/api/onboarding", Some(submission("retry@acme.com"))).await;
    let request_id = body["data"]["request_id"].as_str().unwrap().to_string();

    h.identity
        .fail_next_register(IdentityError::Unavailable("503".into()));
    let (status, _) = call(
        &app,
        "POST",
        "/api/onboarding/approve",
        Some(json!({ "request_id": request_id })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);

    let (status, body) = call(&app, "GET", "/api/onboarding?state=failed", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["retry_count"], 1);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/onboarding/{request_id}/retry"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");
}
