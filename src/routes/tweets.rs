use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};

use crate::{
    error::AppError,
    models::{
        auth::AuthenticatedUser,
        response::ApiResponse,
        tweet::{DeletedTweet, Tweet, TweetRequest, TweetView},
    },
    services::tweets::TweetService,
    AppState,
};

pub async fn create_tweet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<TweetRequest>, JsonRejection>,
) -> Result<ApiResponse<Tweet>, AppError> {
    let Json(body) = payload?;
    let tweet = TweetService::create(state.tweets.as_ref(), user.user_id, body.content.as_deref()).await?;
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

pub async fn get_user_tweets(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Path(username): Path<String>,
) -> Result<ApiResponse<Vec<TweetView>>, AppError> {
    let tweets =
        TweetService::list_for_username(state.users.as_ref(), state.tweets.as_ref(), &username)
            .await?;
    Ok(ApiResponse::ok(tweets, "Tweets fetched successfully"))
}

pub async fn update_tweet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tweet_id): Path<String>,
    payload: Result<Json<TweetRequest>, JsonRejection>,
) -> Result<ApiResponse<Tweet>, AppError> {
    let Json(body) = payload?;
    let tweet = TweetService::update(
        state.tweets.as_ref(),
        user.user_id,
        &tweet_id,
        body.content.as_deref(),
    )
    .await?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

pub async fn delete_tweet(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(tweet_id): Path<String>,
) -> Result<ApiResponse<DeletedTweet>, AppError> {
    let tweet = TweetService::delete(state.tweets.as_ref(), user.user_id, &tweet_id).await?;
    Ok(ApiResponse::ok(
        DeletedTweet { deleted_tweet: tweet },
        "Tweet deleted successfully",
    ))
}
