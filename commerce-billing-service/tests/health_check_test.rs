mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use common::{offline_router, TestApp};
use serde_json::Value;
use tower::ServiceExt;

#[tokio::test]
async fn test_metrics_endpoint_is_served() {
    let response = offline_router(None)
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/plain; charset=utf-8"
    );
}

#[tokio::test]
async fn test_health_reports_unreachable_database() {
    let response = offline_router(None)
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let response = offline_router(None)
        .oneshot(
            Request::get("/metrics")
                .header("x-request-id", "req-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers().get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
    assert_eq!(response.headers().get("x-request-id").unwrap(), "req-123");
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let response = offline_router(None)
        .oneshot(Request::get("/purchase/delete-purchase").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_check_with_database() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let response = app.get("/health").await;
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "commerce-billing-service");
    assert_eq!(body["inventorySync"], true);

    let response = app.get("/ready").await;
    assert!(response.status().is_success());

    app.cleanup().await;
}
