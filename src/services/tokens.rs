use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
    config::Config,
    error::AuthFailure,
    models::auth::{Claims, TokenClass},
};

/// Longest lifetime either token class may be configured with.
pub const MAX_TTL_SECONDS: u64 = 365 * 86_400;

struct SigningKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_seconds: u64,
}

impl SigningKeys {
    fn new(secret: &str, ttl_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_seconds,
        }
    }
}

/// Mints and verifies HS256 tokens. Access and refresh tokens use separate
/// secrets, so a token of one class never verifies as the other.
pub struct TokenService {
    access: SigningKeys,
    refresh: SigningKeys,
}

impl TokenService {
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl_seconds: u64,
        refresh_ttl_seconds: u64,
    ) -> anyhow::Result<Self> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            anyhow::bail!("token signing secrets must not be empty");
        }
        if access_secret == refresh_secret {
            anyhow::bail!("access and refresh tokens must be signed with different secrets");
        }
        for ttl in [access_ttl_seconds, refresh_ttl_seconds] {
            if ttl == 0 || ttl > MAX_TTL_SECONDS {
                anyhow::bail!("token lifetime must be between 1 and {MAX_TTL_SECONDS} seconds, got {ttl}");
            }
        }
        Ok(Self {
            access: SigningKeys::new(access_secret, access_ttl_seconds),
            refresh: SigningKeys::new(refresh_secret, refresh_ttl_seconds),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(
            &config.access_token_secret,
            &config.refresh_token_secret,
            config.access_token_expiry_seconds,
            config.refresh_token_expiry_seconds(),
        )
    }

    fn keys(&self, class: TokenClass) -> &SigningKeys {
        match class {
            TokenClass::Access => &self.access,
            TokenClass::Refresh => &self.refresh,
        }
    }

    pub fn ttl(&self, class: TokenClass) -> u64 {
        self.keys(class).ttl_seconds
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(TokenClass::Access, user_id, Utc::now().timestamp())
    }

    pub fn issue_refresh_token(&self, user_id: Uuid) -> anyhow::Result<String> {
        self.issue_at(TokenClass::Refresh, user_id, Utc::now().timestamp())
    }

    pub fn issue_at(&self, class: TokenClass, user_id: Uuid, now: i64) -> anyhow::Result<String> {
        let keys = self.keys(class);
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now.saturating_add(keys.ttl_seconds as i64),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?;
        Ok(token)
    }

    pub fn verify(&self, token: &str, class: TokenClass) -> Result<Claims, AuthFailure> {
        self.verify_at(token, class, Utc::now().timestamp())
    }

    /// Expiry is checked here against `now` rather than by jsonwebtoken, so
    /// the boundary is exact: valid while `now < exp`.
    pub fn verify_at(&self, token: &str, class: TokenClass, now: i64) -> Result<Claims, AuthFailure> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        let data = decode::<Claims>(token, &self.keys(class).decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => AuthFailure::InvalidToken,
                ErrorKind::ExpiredSignature => AuthFailure::Expired,
                _ => AuthFailure::Malformed,
            }
        })?;

        if now >= data.claims.exp {
            return Err(AuthFailure::Expired);
        }
        Ok(data.claims)
    }
}

/// What the credential store keeps instead of the raw refresh token.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}
