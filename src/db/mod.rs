pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use uuid::Uuid;

use crate::models::{
    tweet::Tweet,
    user::{MediaSlot, NewUser, User},
};

/// Every connection gets a server-side `statement_timeout`, so a stalled
/// write is rolled back by Postgres and reports a real error.
pub async fn create_pool(database_url: &str, statement_timeout: Duration) -> anyhow::Result<PgPool> {
    let timeout_ms = statement_timeout.as_millis();
    let pool = PgPoolOptions::new()
        .max_connections(20)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                conn.execute(format!("SET statement_timeout = {timeout_ms}").as_str())
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Run the schema migrations embedded in ./migrations/
pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique constraint rejected the write (name of the constraint or column).
    #[error("duplicate value violates {0}")]
    Duplicate(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                let constraint = db_err.constraint().unwrap_or("unique constraint").to_string();
                return StoreError::Duplicate(constraint);
            }
        }
        StoreError::Backend(err.into())
    }
}

/// Persistent user identities and the single live refresh-token reference
/// per user. All session truth lives behind this trait.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    /// Lookup by username or email; `identifier` is already lowercased.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    async fn identity_taken(&self, username: &str, email: &str) -> Result<bool, StoreError>;

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Unconditional overwrite (login) or clear (logout, `None`).
    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), StoreError>;

    /// Replace the stored fingerprint only if it still equals `expected`.
    /// Returns false when another rotation or a logout got there first.
    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError>;

    /// Stores a new password hash and revokes the live refresh token.
    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError>;

    async fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError>;

    async fn set_media_url(
        &self,
        id: Uuid,
        slot: MediaSlot,
        url: &str,
    ) -> Result<Option<User>, StoreError>;
}

/// Short text posts owned by users.
#[async_trait]
pub trait TweetStore: Send + Sync {
    async fn create_tweet(&self, owner_id: Uuid, content: &str) -> Result<Tweet, StoreError>;

    /// Newest first.
    async fn tweets_by_owner(&self, owner_id: Uuid) -> Result<Vec<Tweet>, StoreError>;

    /// `None` when the tweet does not exist or belongs to someone else.
    async fn update_tweet(
        &self,
        id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Tweet>, StoreError>;

    async fn delete_tweet(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Tweet>, StoreError>;
}
