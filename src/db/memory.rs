//! In-process store used by the test suite. Same semantics as `PgStore`,
//! including unique username/email and the atomic refresh-token swap.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{CredentialStore, StoreError, TweetStore};
use crate::models::{
    tweet::Tweet,
    user::{MediaSlot, NewUser, User},
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    tweets: Vec<Tweet>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn user_count(&self) -> usize {
        self.tables.lock().await.users.len()
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == identifier || u.email == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn identity_taken(&self, username: &str, email: &str) -> Result<bool, StoreError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .any(|u| u.username == username || u.email == email))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Duplicate("users_username_key".into()));
        }
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Duplicate("users_email_key".into()));
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            username: new_user.username,
            email: new_user.email,
            full_name: new_user.full_name,
            password_hash: new_user.password_hash,
            avatar_url: new_user.avatar_url,
            cover_image_url: new_user.cover_image_url,
            refresh_token_hash: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token_hash: Option<&str>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.refresh_token_hash = token_hash.map(str::to_string);
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn rotate_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        replacement: &str,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.lock().await;
        match tables.users.get_mut(&id) {
            Some(user) if user.refresh_token_hash.as_deref() == Some(expected) => {
                user.refresh_token_hash = Some(replacement.to_string());
                user.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.password_hash = password_hash.to_string();
            user.refresh_token_hash = None;
            user.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.lock().await;
        if let Some(email) = email {
            if tables.users.values().any(|u| u.id != id && u.email == email) {
                return Err(StoreError::Duplicate("users_email_key".into()));
            }
        }
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(full_name) = full_name {
            user.full_name = full_name.to_string();
        }
        if let Some(email) = email {
            user.email = email.to_string();
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }

    async fn set_media_url(
        &self,
        id: Uuid,
        slot: MediaSlot,
        url: &str,
    ) -> Result<Option<User>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        match slot {
            MediaSlot::Avatar => user.avatar_url = url.to_string(),
            MediaSlot::CoverImage => user.cover_image_url = Some(url.to_string()),
        }
        user.updated_at = Utc::now();
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl TweetStore for MemoryStore {
    async fn create_tweet(&self, owner_id: Uuid, content: &str) -> Result<Tweet, StoreError> {
        let now = Utc::now();
        let tweet = Tweet {
            id: Uuid::new_v4(),
            owner_id,
            content: content.to_string(),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.tweets.push(tweet.clone());
        Ok(tweet)
    }

    async fn tweets_by_owner(&self, owner_id: Uuid) -> Result<Vec<Tweet>, StoreError> {
        let tables = self.tables.lock().await;
        let mut tweets: Vec<Tweet> = tables
            .tweets
            .iter()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        // Insertion order breaks ties between tweets created in the same instant.
        tweets.reverse();
        tweets.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tweets)
    }

    async fn update_tweet(
        &self,
        id: Uuid,
        owner_id: Uuid,
        content: &str,
    ) -> Result<Option<Tweet>, StoreError> {
        let mut tables = self.tables.lock().await;
        let Some(tweet) = tables
            .tweets
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner_id)
        else {
            return Ok(None);
        };
        tweet.content = content.to_string();
        tweet.updated_at = Utc::now();
        Ok(Some(tweet.clone()))
    }

    async fn delete_tweet(&self, id: Uuid, owner_id: Uuid) -> Result<Option<Tweet>, StoreError> {
        let mut tables = self.tables.lock().await;
        let position = tables
            .tweets
            .iter()
            .position(|t| t.id == id && t.owner_id == owner_id);
        Ok(position.map(|idx| tables.tweets.remove(idx)))
    }
}
