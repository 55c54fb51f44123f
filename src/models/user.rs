use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// DB row struct. Never serialized directly: it carries the password hash and
/// the current refresh-token fingerprint.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
    /// SHA-256 of the single refresh token currently allowed for this user.
    pub refresh_token_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password_hash: String,
    pub avatar_url: String,
    pub cover_image_url: Option<String>,
}

/// Which media reference on the user record an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaSlot {
    Avatar,
    CoverImage,
}

impl MediaSlot {
    pub fn field_name(&self) -> &'static str {
        match self {
            MediaSlot::Avatar => "avatar",
            MediaSlot::CoverImage => "coverImage",
        }
    }
}

// Request/Response DTOs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub avatar: String,
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            full_name: u.full_name,
            avatar: u.avatar_url,
            cover_image: u.cover_image_url,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Text fields of the multipart registration form.
#[derive(Debug, Clone, Default)]
pub struct RegisterRequest {
    pub full_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Login accepts either `username`, `email` or a generic `identifier`.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub identifier: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn identifier(&self) -> Option<&str> {
        [&self.username, &self.email, &self.identifier]
            .into_iter()
            .flatten()
            .map(|s| s.trim())
            .find(|s| !s.is_empty())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserProfile,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAccountRequest {
    pub full_name: Option<String>,
    pub email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            full_name: "Alice Liddell".into(),
            password_hash: "$2b$04$hash".into(),
            avatar_url: "http://media/avatar.png".into(),
            cover_image_url: None,
            refresh_token_hash: Some("abc123".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn profile_never_exposes_secrets() {
        let value = serde_json::to_value(UserProfile::from(sample_user())).unwrap();
        let obj = value.as_object().unwrap();

        assert!(!obj.contains_key("password"));
        assert!(!obj.contains_key("passwordHash"));
        assert!(!obj.contains_key("refreshToken"));
        assert!(!obj.contains_key("refreshTokenHash"));
        assert_eq!(obj["username"], "alice");
        assert_eq!(obj["coverImage"], serde_json::Value::Null);
    }

    #[test]
    fn login_identifier_prefers_first_non_blank() {
        let req: LoginRequest =
            serde_json::from_str(r#"{"username":"  ","email":"a@b.c","password":"x"}"#).unwrap();
        assert_eq!(req.identifier(), Some("a@b.c"));

        let req: LoginRequest = serde_json::from_str(r#"{"password":"x"}"#).unwrap();
        assert_eq!(req.identifier(), None);
    }
}
