use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{CredentialStore, StoreError, TweetStore};
use crate::models::{
    tweet::Tweet,
    user::{MediaSlot, NewUser, User},
};

const USER_COLS: &str = "id, username, email, full_name, password_hash, avatar_url,
    cover_image_url, refresh_token_hash, created_at, updated_at";

const TWEET_COLS: &str = "id, owner_id, content, created_at, updated_at";

/// Postgres-backed credential and tweet store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLS} FROM users WHERE username = $1 OR email = $1 LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user =
            sqlx::query_as::<_, User>(&format!("SELECT {USER_COLS} FROM users WHERE username = $1"))
                .bind(username)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }

    async fn identity_taken(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = $1 OR email = $2)",
        )
        .bind(username)
        .bind(email)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (id, username, email, full_name, password_hash, avatar_url, cover_image_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.full_name)
        .bind(&new_user.password_hash)
        .bind(&new_user.avatar_url)
        .bind(&new_user.cover_image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), StoreError> {
        sqlx::query("UPDATE users SET refresh_token_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(token_hash)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError> {
        // Single conditional UPDATE: the compare and the swap cannot interleave
        // with a concurrent rotation for the same user.
        let result = sqlx::query(
            "UPDATE users SET refresh_token_hash = $3, updated_at = NOW()
             WHERE id = $1 AND refresh_token_hash = $2",
        )
        .bind(id)
        .bind(expected)
        .bind(replacement)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE users SET password_hash = $2, refresh_token_hash = NULL, updated_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET full_name = COALESCE($2, full_name),
                 email = COALESCE($3, email),
                 updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLS}"
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn set_media_url(
        &self,
        id: Uuid,
        slot: MediaSlot,
        url: &str,
    ) -> Result<Option<User>, StoreError> {
        let column = match slot {
            MediaSlot::Avatar => "avatar_url",
            MediaSlot::CoverImage => "cover_image_url",
        };
        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET {column} = $2, updated_at = NOW() WHERE id = $1 RETURNING {USER_COLS}"
        ))
        .bind(id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl TweetStore for PgStore {
    async fn create_tweet(&self, owner_id: Uuid, content: &str) -> Result<Tweet, StoreError> {
        let tweet = sqlx::query_as::<_, Tweet>(&format!(
            "INSERT INTO tweets (id, owner_id, content) VALUES ($1, $2, $3) RETURNING {TWEET_COLS}"
        ))
        .bind(Uuid::new_v4())
        .bind(owner_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?;
        Ok(tweet)
    }

    async fn tweets_by_owner(&self, owner_id: Uuid) -> Result<Vec<Tweet>, StoreError> {
        let tweets = sqlx::query_as::<_, Tweet>(&format!(
            "SELECT {TWEET_COLS} FROM tweets WHERE owner_id = $1 ORDER BY created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tweets)
    }

    async fn update_tweet(
        &self,
        id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Tweet>, StoreError> {
        let tweet = sqlx::query_as::<_, Tweet>(&format!(
            "UPDATE tweets SET content = $3, updated_at = NOW()
             WHERE id = $1 AND owner_id = $2
             RETURNING {TWEET_COLS}"
        ))
        .bind(id)
        .bind(owner_id)
        .bind(content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tweet)
    }

    async fn delete_tweet(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Tweet>, StoreError> {
        let tweet = sqlx::query_as::<_, Tweet>(&format!(
            "DELETE FROM tweets WHERE id = $1 AND owner_id = $2 RETURNING {TWEET_COLS}"
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tweet)
    }
}
