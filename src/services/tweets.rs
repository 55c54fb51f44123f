use uuid::Uuid;

use crate::{
    db::{CredentialStore, TweetStore},
    error::AppError,
    models::tweet::{Tweet, TweetOwner, TweetView, MAX_TWEET_CHARS},
};

/// Trimmed content of 1 to 280 characters.
pub fn validate_content(content: Option<&str>) -> Result<String, AppError> {
    let content = content.map(str::trim).unwrap_or("");
    if content.is_empty() {
        return Err(AppError::Validation("Content is required".into()));
    }
    if content.chars().count() > MAX_TWEET_CHARS {
        return Err(AppError::Validation(format!(
            "Content cannot exceed {MAX_TWEET_CHARS} characters"
        )));
    }
    Ok(content.to_string())
}

pub fn parse_tweet_id(raw: &str) -> Result<Uuid, AppError> {
    raw.parse()
        .map_err(|_| AppError::Validation("Invalid tweet ID".into()))
}

pub struct TweetService;

impl TweetService {
    pub async fn create(
        tweets: &dyn TweetStore,
        owner_id: Uuid,
        content: Option<&str>,
    ) -> Result<Tweet, AppError> {
        let content = validate_content(content)?;
        Ok(tweets.create_tweet(owner_id, &content).await?)
    }

    /// Newest first, each with the owner's public summary.
    pub async fn list_for_username(
        users: &dyn CredentialStore,
        tweets: &dyn TweetStore,
        username: &str,
    ) -> Result<Vec<TweetView>, AppError> {
        let username = username.trim().to_lowercase();
        if username.is_empty() {
            return Err(AppError::Validation("Username is required".into()));
        }
        let owner = users
            .find_by_username(&username)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        let summary = TweetOwner::from(&owner);

        Ok(tweets
            .tweets_by_owner(owner.id)
            .await?
            .into_iter()
            .map(|t| TweetView {
                id: t.id,
                content: t.content,
                owner: summary.clone(),
                created_at: t.created_at,
                updated_at: t.updated_at,
            })
            .collect())
    }

    /// Someone else's tweet reads as missing.
    pub async fn update(
        tweets: &dyn TweetStore,
        owner_id: Uuid,
        tweet_id: &str,
        content: Option<&str>,
    ) -> Result<Tweet, AppError> {
        let tweet_id = parse_tweet_id(tweet_id)?;
        let content = validate_content(content)?;
        tweets
            .update_tweet(tweet_id, owner_id, &content)
            .await?
            .ok_or_else(|| AppError::NotFound("Tweet not found".into()))
    }

    pub async fn delete(
        tweets: &dyn TweetStore,
        owner_id: Uuid,
        tweet_id: &str,
    ) -> Result<Tweet, AppError> {
        let tweet_id = parse_tweet_id(tweet_id)?;
        tweets
            .delete_tweet(tweet_id, owner_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Tweet not found".into()))
    }
}
