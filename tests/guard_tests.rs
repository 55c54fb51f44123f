//! Access guard: credential lookup order and token checks.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use uuid::Uuid;

use vidtube_api::models::auth::TokenClass;

mod common;
use common::{bearer, json_request, spawn_app};

const CURRENT_USER: &str = "/api/v1/users/current-user";

fn with_cookie(token: &str, authorization: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("GET")
        .uri(CURRENT_USER)
        .header(header::COOKIE, format!("theme=dark; accessToken={token}"));
    if let Some(value) = authorization {
        builder = builder.header(header::AUTHORIZATION, value);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn missing_token_is_unauthorized() {
    let app = spawn_app();
    let response = app
        .send(Request::builder().uri(CURRENT_USER).body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["success"], false);
    assert_eq!(response.body["data"], serde_json::Value::Null);
}

#[tokio::test]
async fn bearer_header_and_cookie_are_accepted() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    let (access, _) = app.login("alice", "wonderland").await;

    let by_header = app.send(bearer("GET", CURRENT_USER, &access)).await;
    assert_eq!(by_header.status, StatusCode::OK);
    assert_eq!(by_header.body["data"]["username"], "alice");
    assert_eq!(by_header.body["data"]["email"], "alice@example.com");
    assert!(by_header.body["data"].get("password").is_none());

    let by_cookie = app.send(with_cookie(&access, None)).await;
    assert_eq!(by_cookie.status, StatusCode::OK);
}

#[tokio::test]
async fn cookie_takes_priority_over_header() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    let (access, _) = app.login("alice", "wonderland").await;

    let good_cookie = app
        .send(with_cookie(&access, Some("Bearer not-a-token")))
        .await;
    assert_eq!(good_cookie.status, StatusCode::OK);

    let bad_cookie = app
        .send(with_cookie("not-a-token", Some(&format!("Bearer {access}"))))
        .await;
    assert_eq!(bad_cookie.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn body_token_is_used_for_json_requests() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    let (access, _) = app.login("alice", "wonderland").await;

    let response = app
        .send(json_request(
            "POST",
            "/api/v1/tweets/create-tweet",
            json!({ "accessToken": access, "content": "posted with a body token" }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    assert_eq!(response.body["data"]["content"], "posted with a body token");
}

#[tokio::test]
async fn refresh_token_is_not_an_access_token() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    let (_, refresh) = app.login("alice", "wonderland").await;

    let response = app.send(bearer("GET", CURRENT_USER, &refresh)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_access_token_is_rejected() {
    let app = spawn_app();
    let user = app.seed_user("alice", "wonderland").await;
    let issued = chrono::Utc::now().timestamp() - 3600;
    let stale = app
        .state
        .tokens
        .issue_at(TokenClass::Access, user.id, issued)
        .unwrap();

    let response = app.send(bearer("GET", CURRENT_USER, &stale)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn token_for_unknown_user_is_rejected() {
    let app = spawn_app();
    let ghost = app.state.tokens.issue_access_token(Uuid::new_v4()).unwrap();

    let response = app.send(bearer("GET", CURRENT_USER, &ghost)).await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn tweet_routes_are_guarded() {
    let app = spawn_app();
    let response = app
        .send(json_request(
            "POST",
            "/api/v1/tweets/create-tweet",
            json!({ "content": "anonymous" }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
