use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::db::StoreError;
use crate::services::object_store::ObjectStoreError;

/// Why a credential was refused. Every variant maps to 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    BadCredential,
    MissingToken,
    InvalidToken,
    Expired,
    Malformed,
    TokenReuseOrRevoked,
    UnknownUser,
}

impl AuthFailure {
    pub fn message(&self) -> &'static str {
        match self {
            AuthFailure::BadCredential => "Invalid user credentials",
            AuthFailure::MissingToken => "Authentication token is required",
            AuthFailure::InvalidToken => "Invalid token",
            AuthFailure::Expired => "Token has expired",
            AuthFailure::Malformed => "Malformed token",
            AuthFailure::TokenReuseOrRevoked => "Refresh token is expired or has already been used",
            AuthFailure::UnknownUser => "User for this token no longer exists",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{}", .0.message())]
    Auth(AuthFailure),

    /// A required asset could not be stored. `rejected` distinguishes a file the
    /// store refused (client fault) from a store that could not be reached.
    #[error("{message}")]
    Upload { message: String, rejected: bool },

    #[error("Too many attempts, try again in a few minutes")]
    RateLimited,

    /// `message` is what the client sees; `source` is only logged.
    #[error("{message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn internal(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        AppError::Internal {
            message: message.into(),
            source: source.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::Upload { rejected: true, .. } => StatusCode::BAD_REQUEST,
            AppError::Upload { rejected: false, .. } => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if let AppError::Internal { message, source } = &self {
            tracing::error!(error = ?source, "{message}");
        }

        let body = json!({
            "statusCode": status.as_u16(),
            "message": self.to_string(),
            "success": false,
        });

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Duplicate(_) => {
                AppError::Conflict("User with this email or username already exists".into())
            }
            StoreError::Backend(source) => AppError::internal("Something went wrong", source),
        }
    }
}

impl From<ObjectStoreError> for AppError {
    fn from(err: ObjectStoreError) -> Self {
        tracing::warn!(error = %err, "object store upload failed");
        let rejected = matches!(err, ObjectStoreError::Rejected(_));
        let message = if rejected {
            "Uploaded file was rejected by the media store"
        } else {
            "File upload failed"
        };
        AppError::Upload {
            message: message.into(),
            rejected,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}
