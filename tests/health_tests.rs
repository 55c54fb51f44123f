use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use tower::ServiceExt;

mod common;
use common::spawn_app;

#[tokio::test]
async fn healthcheck_uses_the_envelope() {
    let app = spawn_app();
    let response = app
        .send(
            Request::builder()
                .uri("/api/v1/healthcheck")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["statusCode"], 200);
    assert_eq!(response.body["data"], "OK");
    assert_eq!(response.body["message"], "Server is running");
    assert_eq!(response.body["success"], true);
}

#[tokio::test]
async fn metrics_are_exposed_as_prometheus_text() {
    let app = spawn_app();
    // make sure at least one counter has a sample
    app.seed_user("alice", "wonderland").await;
    app.login("alice", "wonderland").await;

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/plain"));
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("api_logins_total"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let app = spawn_app();
    let response = app
        .send(Request::builder().uri("/api/v1/nowhere").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}
