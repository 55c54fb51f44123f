use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, TextEncoder};

use crate::error::AppError;

/// GET /metrics: Prometheus scrape endpoint for the session and upload counters.
pub async fn metrics_handler() -> Result<Response, AppError> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&prometheus::gather(), &mut buffer)
        .map_err(|e| AppError::internal("Could not encode metrics", e))?;
    Ok(([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response())
}
