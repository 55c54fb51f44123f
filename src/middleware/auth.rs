use axum::{
    body::{to_bytes, Body},
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use serde_json::Value;

use crate::{
    error::{AppError, AuthFailure},
    middleware::cookies::{get_cookie, ACCESS_COOKIE, REFRESH_COOKIE},
    models::auth::{AuthenticatedUser, TokenClass},
    AppState,
};

/// Largest body the guard will buffer while looking for a token field.
const MAX_BUFFERED_BODY: usize = 16 * 1024;

/// One place a credential may be carried on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie(&'static str),
    BearerHeader,
    JsonBody(&'static str),
}

/// Checked in order; the first non-empty value wins.
pub const ACCESS_TOKEN_SOURCES: &[CredentialSource] = &[
    CredentialSource::Cookie(ACCESS_COOKIE),
    CredentialSource::BearerHeader,
    CredentialSource::JsonBody("accessToken"),
];

pub const REFRESH_TOKEN_SOURCES: &[CredentialSource] = &[
    CredentialSource::Cookie(REFRESH_COOKIE),
    CredentialSource::JsonBody("refreshToken"),
];

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Looks for a credential in `sources` order. Body sources are skipped when
/// `body` is `None`.
pub fn find_credential(
    sources: &[CredentialSource],
    headers: &HeaderMap,
    body: Option<&Value>,
) -> Option<String> {
    sources.iter().find_map(|source| match source {
        CredentialSource::Cookie(name) => get_cookie(headers, name),
        CredentialSource::BearerHeader => headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .and_then(non_empty),
        CredentialSource::JsonBody(field) => body
            .and_then(|b| b.get(*field))
            .and_then(Value::as_str)
            .and_then(non_empty),
    })
}

pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Parses a buffered JSON body; anything unparseable is treated as no body.
pub fn json_body(headers: &HeaderMap, bytes: &[u8]) -> Option<Value> {
    if bytes.is_empty() || !is_json(headers) {
        return None;
    }
    serde_json::from_slice(bytes).ok()
}

/// Resolves a credential from the request, buffering the body only when
/// the header sources came up empty. The body is handed back intact.
async fn take_credential(
    sources: &[CredentialSource],
    parts: &Parts,
    body: Body,
) -> Result<(Option<String>, Body), AppError> {
    if let Some(token) = find_credential(sources, &parts.headers, None) {
        return Ok((Some(token), body));
    }

    let wants_body = sources
        .iter()
        .any(|s| matches!(s, CredentialSource::JsonBody(_)));
    if !wants_body || !is_json(&parts.headers) {
        return Ok((None, body));
    }

    let bytes = to_bytes(body, MAX_BUFFERED_BODY)
        .await
        .map_err(|_| AppError::Validation("Request body is too large".into()))?;
    let token = json_body(&parts.headers, &bytes)
        .and_then(|value| find_credential(sources, &parts.headers, Some(&value)));
    Ok((token, Body::from(bytes)))
}

/// Access guard. Verifies the access token, loads the user, and attaches an
/// `AuthenticatedUser` to the request. Never touches the refresh token.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = request.into_parts();
    let (token, body) = take_credential(ACCESS_TOKEN_SOURCES, &parts, body).await?;
    let token = token.ok_or(AppError::Auth(AuthFailure::MissingToken))?;

    let claims = state
        .tokens
        .verify(&token, TokenClass::Access)
        .map_err(AppError::Auth)?;
    let user_id = claims
        .user_id()
        .ok_or(AppError::Auth(AuthFailure::Malformed))?;

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(AppError::Auth(AuthFailure::UnknownUser))?;

    parts.extensions.insert(AuthenticatedUser {
        user_id,
        profile: user.into(),
    });

    Ok(next.run(Request::from_parts(parts, body)).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or(AppError::Auth(AuthFailure::MissingToken))
    }
}
