use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::User;

pub const MAX_TWEET_CHARS: usize = 280;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: Uuid,
    #[serde(rename = "owner")]
    pub owner_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetOwner {
    pub id: Uuid,
    pub full_name: String,
    pub username: String,
    pub avatar: String,
}

impl From<&User> for TweetOwner {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            full_name: u.full_name.clone(),
            username: u.username.clone(),
            avatar: u.avatar_url.clone(),
        }
    }
}

/// A tweet with its owner's public summary, as returned by listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TweetView {
    pub id: Uuid,
    pub content: String,
    pub owner: TweetOwner,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct TweetRequest {
    pub content: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedTweet {
    pub deleted_tweet: Tweet,
}
