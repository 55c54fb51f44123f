use axum::extract::State;

use crate::{error::AppError, models::response::ApiResponse, AppState};

pub async fn healthcheck(State(state): State<AppState>) -> Result<ApiResponse<&'static str>, AppError> {
    state
        .users
        .ping()
        .await
        .map_err(|e| AppError::internal("Database is unreachable", e))?;
    Ok(ApiResponse::ok("OK", "Server is running"))
}
