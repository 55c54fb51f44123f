use uuid::Uuid;

use crate::{
    db::{CredentialStore, StoreError},
    error::{AppError, AuthFailure},
    models::{
        auth::TokenClass,
        user::{LoginResponse, TokenPair, UserProfile},
    },
    services::{
        metrics::{LOGINS_COUNTER, REFRESH_COUNTER},
        password::{hash_password, verify_password},
        tokens::{fingerprint, TokenService},
    },
};

fn issue_pair(tokens: &TokenService, user_id: Uuid) -> Result<TokenPair, AppError> {
    let access_token = tokens
        .issue_access_token(user_id)
        .map_err(|e| AppError::internal("Something went wrong while generating tokens", e))?;
    let refresh_token = tokens
        .issue_refresh_token(user_id)
        .map_err(|e| AppError::internal("Something went wrong while generating tokens", e))?;
    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Session lifecycle: login, refresh-token rotation, logout, and the account
/// changes that have to invalidate or re-check credentials.
pub struct AuthService;

impl AuthService {
    /// Verifies the password and opens a session. The new refresh token
    /// replaces any previous one, so a user has at most one live session.
    pub async fn login(
        users: &dyn CredentialStore,
        tokens: &TokenService,
        identifier: &str,
        password: &str,
    ) -> Result<LoginResponse, AppError> {
        let identifier = identifier.trim().to_lowercase();

        let Some(user) = users.find_by_identifier(&identifier).await? else {
            LOGINS_COUNTER.with_label_values(&["unknown_user"]).inc();
            return Err(AppError::NotFound("User does not exist".into()));
        };

        if !verify_password(password, &user.password_hash) {
            LOGINS_COUNTER.with_label_values(&["bad_password"]).inc();
            tracing::info!(user_id = %user.id, "login rejected: wrong password");
            return Err(AppError::Auth(AuthFailure::BadCredential));
        }

        let pair = issue_pair(tokens, user.id)?;
        users
            .set_refresh_token(user.id, Some(&fingerprint(&pair.refresh_token)))
            .await?;

        LOGINS_COUNTER.with_label_values(&["success"]).inc();
        tracing::info!(user_id = %user.id, "user logged in");

        Ok(LoginResponse {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            user: UserProfile::from(user),
        })
    }

    /// Trades a refresh token for a new pair. The swap of the stored
    /// fingerprint is conditional on it still matching the presented token,
    /// so each refresh token is accepted at most once.
    pub async fn refresh(
        users: &dyn CredentialStore,
        tokens: &TokenService,
        refresh_token: &str,
    ) -> Result<TokenPair, AppError> {
        let claims = tokens.verify(refresh_token, TokenClass::Refresh).map_err(|failure| {
            REFRESH_COUNTER.with_label_values(&["invalid"]).inc();
            AppError::Auth(failure)
        })?;
        let user_id = claims
            .user_id()
            .ok_or(AppError::Auth(AuthFailure::Malformed))?;

        let user = users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let pair = issue_pair(tokens, user.id)?;
        let swapped = users
            .rotate_refresh_token(
                user.id,
                &fingerprint(refresh_token),
                &fingerprint(&pair.refresh_token),
            )
            .await?;

        if !swapped {
            REFRESH_COUNTER.with_label_values(&["reused"]).inc();
            tracing::warn!(user_id = %user.id, jti = %claims.jti, "refresh token reuse or revoked session");
            return Err(AppError::Auth(AuthFailure::TokenReuseOrRevoked));
        }

        REFRESH_COUNTER.with_label_values(&["rotated"]).inc();
        Ok(pair)
    }

    /// Unconditional: logging out twice is fine.
    pub async fn logout(users: &dyn CredentialStore, user_id: Uuid) -> Result<(), AppError> {
        users.set_refresh_token(user_id, None).await?;
        tracing::info!(%user_id, "user logged out");
        Ok(())
    }

    /// Also revokes the stored refresh token, ending sessions elsewhere.
    pub async fn change_password(
        users: &dyn CredentialStore,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
        bcrypt_cost: u32,
    ) -> Result<(), AppError> {
        if new_password.trim().is_empty() {
            return Err(AppError::Validation("New password is required".into()));
        }

        let user = users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        if !verify_password(old_password, &user.password_hash) {
            return Err(AppError::Auth(AuthFailure::BadCredential));
        }

        let hash = hash_password(new_password, bcrypt_cost)
            .map_err(|e| AppError::internal("Something went wrong while changing the password", e))?;
        users.update_password(user_id, &hash).await?;
        tracing::info!(%user_id, "password changed, refresh token revoked");
        Ok(())
    }

    pub async fn update_account(
        users: &dyn CredentialStore,
        user_id: Uuid,
        full_name: Option<&str>,
        email: Option<&str>,
    ) -> Result<UserProfile, AppError> {
        if full_name.is_none() && email.is_none() {
            return Err(AppError::Validation("fullName or email is required".into()));
        }
        let full_name = full_name.map(str::trim);
        let email = email.map(|e| e.trim().to_lowercase());
        if full_name.is_some_and(str::is_empty) || email.as_deref().is_some_and(str::is_empty) {
            return Err(AppError::Validation("fullName and email must not be blank".into()));
        }

        let updated = users
            .update_account(user_id, full_name, email.as_deref())
            .await
            .map_err(|e| match e {
                StoreError::Duplicate(_) => AppError::Conflict("Email is already in use".into()),
                other => other.into(),
            })?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        Ok(updated.into())
    }
}
