use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserProfile;

/// Claims embedded in both token classes. `jti` makes every minted token
/// unique, even two issued for the same user within the same second.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String, // user UUID
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
}

/// The two token classes, each signed with its own secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenClass {
    Access,
    Refresh,
}

/// Resolved by the access guard and attached to the request extensions.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub profile: UserProfile,
}

impl Claims {
    pub fn user_id(&self) -> Option<Uuid> {
        self.sub.parse().ok()
    }
}
