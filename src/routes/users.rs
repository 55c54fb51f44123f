use std::{path::Path, time::Duration};

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, rejection::JsonRejection, Multipart, State},
    http::{header, HeaderMap},
    response::{AppendHeaders, IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AuthFailure},
    middleware::{
        auth::{find_credential, json_body, REFRESH_TOKEN_SOURCES},
        cookies::{clear_cookie, session_cookie, ACCESS_COOKIE, REFRESH_COOKIE},
        rate_limit::{check_rate_limit, login_key},
    },
    models::{
        auth::{AuthenticatedUser, TokenClass},
        response::ApiResponse,
        user::{
            ChangePasswordRequest, LoginRequest, MediaSlot, RegisterRequest, TokenPair,
            UpdateAccountRequest, UserProfile,
        },
    },
    services::{auth::AuthService, media::MediaService, uploads::stage_multipart},
    AppState,
};

fn session_cookies(
    state: &AppState,
    access_token: &str,
    refresh_token: &str,
) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    let secure = state.config.production;
    AppendHeaders([
        (
            header::SET_COOKIE,
            session_cookie(ACCESS_COOKIE, access_token, state.tokens.ttl(TokenClass::Access), secure),
        ),
        (
            header::SET_COOKIE,
            session_cookie(REFRESH_COOKIE, refresh_token, state.tokens.ttl(TokenClass::Refresh), secure),
        ),
    ])
}

fn store_timeout(state: &AppState) -> Duration {
    Duration::from_secs(state.config.store_timeout_seconds)
}

pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(body) = payload?;
    let identifier = body
        .identifier()
        .ok_or_else(|| AppError::Validation("Username or email is required".into()))?
        .to_string();

    // Rate limit: 5 attempts per 15 min per identifier
    if let Some(redis) = &state.redis {
        let mut redis = redis.clone();
        check_rate_limit(&mut redis, &login_key(&identifier), 5, 900).await?;
    }

    let session = AuthService::login(
        state.users.as_ref(),
        &state.tokens,
        &identifier,
        &body.password,
    )
    .await?;

    let cookies = session_cookies(&state, &session.access_token, &session.refresh_token);
    Ok((cookies, ApiResponse::ok(session, "User logged in successfully")).into_response())
}

/// Refresh token from the `refreshToken` cookie, else from a JSON body field
/// of the same name.
pub async fn refresh_access_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let parsed = json_body(&headers, &body);
    let refresh_token = find_credential(REFRESH_TOKEN_SOURCES, &headers, parsed.as_ref())
        .ok_or(AppError::Auth(AuthFailure::MissingToken))?;

    let pair: TokenPair =
        AuthService::refresh(state.users.as_ref(), &state.tokens, &refresh_token).await?;

    let cookies = session_cookies(&state, &pair.access_token, &pair.refresh_token);
    Ok((cookies, ApiResponse::ok(pair, "Access token refreshed successfully")).into_response())
}

pub async fn logout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Response, AppError> {
    AuthService::logout(state.users.as_ref(), user.user_id).await?;

    let secure = state.config.production;
    let cookies = AppendHeaders([
        (header::SET_COOKIE, clear_cookie(ACCESS_COOKIE, secure)),
        (header::SET_COOKIE, clear_cookie(REFRESH_COOKIE, secure)),
    ]);
    Ok((cookies, ApiResponse::ok(json!({}), "User logged out successfully")).into_response())
}

/// Multipart: `fullName`, `username`, `email`, `password`, required `avatar`
/// file, optional `coverImage` file.
pub async fn register(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let mut multipart = multipart?;
    let mut form = stage_multipart(
        &mut multipart,
        Path::new(&state.config.upload_temp_dir),
        &[MediaSlot::Avatar.field_name(), MediaSlot::CoverImage.field_name()],
    )
    .await?;

    let request = RegisterRequest {
        full_name: form.text("fullName").to_string(),
        username: form.text("username").to_string(),
        email: form.text("email").to_string(),
        password: form.text("password").to_string(),
    };
    let avatar = form.take_file(MediaSlot::Avatar.field_name());
    let cover = form.take_file(MediaSlot::CoverImage.field_name());

    // Detached from the request future: a client hanging up mid-upload must
    // not cancel the compensation path.
    let timeout = store_timeout(&state);
    let task = tokio::spawn(async move {
        MediaService::register_with_media(
            state.users.clone(),
            state.objects.clone(),
            request,
            avatar,
            cover,
            state.config.bcrypt_cost,
            timeout,
        )
        .await
    });

    let profile = task
        .await
        .map_err(|e| AppError::internal("Something went wrong while creating user", e))??;

    Ok(ApiResponse::created(profile, "User registered successfully"))
}

pub async fn current_user(user: AuthenticatedUser) -> ApiResponse<UserProfile> {
    ApiResponse::ok(user.profile, "Current user fetched successfully")
}

pub async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<ApiResponse<Value>, AppError> {
    let Json(body) = payload?;
    AuthService::change_password(
        state.users.as_ref(),
        user.user_id,
        &body.old_password,
        &body.new_password,
        state.config.bcrypt_cost,
    )
    .await?;
    Ok(ApiResponse::ok(json!({}), "Password changed successfully"))
}

pub async fn update_account_details(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    payload: Result<Json<UpdateAccountRequest>, JsonRejection>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let Json(body) = payload?;
    let profile = AuthService::update_account(
        state.users.as_ref(),
        user.user_id,
        body.full_name.as_deref(),
        body.email.as_deref(),
    )
    .await?;
    Ok(ApiResponse::ok(profile, "Account details updated successfully"))
}

async fn replace_media(
    state: AppState,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
    slot: MediaSlot,
) -> Result<ApiResponse<UserProfile>, AppError> {
    let mut multipart = multipart?;
    let field = slot.field_name();
    let mut form = stage_multipart(
        &mut multipart,
        Path::new(&state.config.upload_temp_dir),
        &[field],
    )
    .await?;
    let file = form
        .take_file(field)
        .ok_or_else(|| AppError::Validation(format!("{field} file is missing")))?;

    let timeout = store_timeout(&state);
    let task = tokio::spawn(async move {
        MediaService::replace(
            state.users.clone(),
            state.objects.clone(),
            user.user_id,
            slot,
            file,
            timeout,
        )
        .await
    });

    let profile = task
        .await
        .map_err(|e| AppError::internal(format!("Error while updating {field}"), e))??;

    let message = match slot {
        MediaSlot::Avatar => "Avatar updated successfully",
        MediaSlot::CoverImage => "Cover image updated successfully",
    };
    Ok(ApiResponse::ok(profile, message))
}

pub async fn update_avatar(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    replace_media(state, user, multipart, MediaSlot::Avatar).await
}

pub async fn update_cover_image(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<UserProfile>, AppError> {
    replace_media(state, user, multipart, MediaSlot::CoverImage).await
}
