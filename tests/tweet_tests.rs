use axum::http::StatusCode;
use serde_json::json;

mod common;
use common::{bearer, bearer_json, spawn_app, TestApp};

async fn post_tweet(app: &TestApp, token: &str, content: &str) -> String {
    let response = app
        .send(bearer_json(
            "POST",
            "/api/v1/tweets/create-tweet",
            token,
            json!({ "content": content }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    response.body["data"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn create_and_list_newest_first() {
    let app = spawn_app();
    let alice = app.seed_user("alice", "wonderland").await;
    let (access, _) = app.login("alice", "wonderland").await;

    post_tweet(&app, &access, "first").await;
    post_tweet(&app, &access, "second").await;

    let response = app
        .send(bearer("GET", "/api/v1/tweets/get-user-tweets/alice", &access))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let tweets = response.body["data"].as_array().unwrap();
    assert_eq!(tweets.len(), 2);
    assert_eq!(tweets[0]["content"], "second");
    assert_eq!(tweets[1]["content"], "first");
    assert_eq!(tweets[0]["owner"]["username"], "alice");
    assert_eq!(tweets[0]["owner"]["id"], alice.id.to_string());
    assert!(tweets[0]["owner"].get("email").is_none());
}

#[tokio::test]
async fn listing_for_unknown_user_is_not_found() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    let (access, _) = app.login("alice", "wonderland").await;

    let response = app
        .send(bearer("GET", "/api/v1/tweets/get-user-tweets/nobody", &access))
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn content_is_validated() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    let (access, _) = app.login("alice", "wonderland").await;

    let empty = app
        .send(bearer_json(
            "POST",
            "/api/v1/tweets/create-tweet",
            &access,
            json!({ "content": "   " }),
        ))
        .await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(empty.body["message"], "Content is required");

    let long = app
        .send(bearer_json(
            "POST",
            "/api/v1/tweets/create-tweet",
            &access,
            json!({ "content": "x".repeat(281) }),
        ))
        .await;
    assert_eq!(long.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_the_owner_can_edit_or_delete() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    app.seed_user("bob", "builder").await;
    let (alice, _) = app.login("alice", "wonderland").await;
    let (bob, _) = app.login("bob", "builder").await;
    let id = post_tweet(&app, &alice, "mine").await;

    let hijack = app
        .send(bearer_json(
            "PATCH",
            &format!("/api/v1/tweets/update-tweet/{id}"),
            &bob,
            json!({ "content": "yours now" }),
        ))
        .await;
    assert_eq!(hijack.status, StatusCode::NOT_FOUND);

    let removal = app
        .send(bearer("DELETE", &format!("/api/v1/tweets/delete-tweet/{id}"), &bob))
        .await;
    assert_eq!(removal.status, StatusCode::NOT_FOUND);

    let edited = app
        .send(bearer_json(
            "PATCH",
            &format!("/api/v1/tweets/update-tweet/{id}"),
            &alice,
            json!({ "content": "still mine" }),
        ))
        .await;
    assert_eq!(edited.status, StatusCode::OK);
    assert_eq!(edited.body["data"]["content"], "still mine");

    let deleted = app
        .send(bearer("DELETE", &format!("/api/v1/tweets/delete-tweet/{id}"), &alice))
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["data"]["deletedTweet"]["id"], id.as_str());

    let listing = app
        .send(bearer("GET", "/api/v1/tweets/get-user-tweets/alice", &alice))
        .await;
    assert_eq!(listing.body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_tweet_id_is_a_bad_request() {
    let app = spawn_app();
    app.seed_user("alice", "wonderland").await;
    let (access, _) = app.login("alice", "wonderland").await;

    let response = app
        .send(bearer("DELETE", "/api/v1/tweets/delete-tweet/not-a-uuid", &access))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["message"], "Invalid tweet ID");
}
