use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("data quality error: {0}")]
    DataQuality(#[from] SeriesError),
    #[error("internal error: {0}")]
    Internal(String),
}

/// A sample handed to the wave chain that breaks the series contract
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("expected sample index {expected}, got {actual}")]
    IndexGap { expected: usize, actual: usize },
    #[error("sample {index} at {timestamp} is not after {previous}")]
    OutOfOrder {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::DataQuality(error) => (StatusCode::UNPROCESSABLE_ENTITY, error.to_string()),
            AppError::Internal(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.clone()),
        };

        let body = Json(ErrorResponse { message });
        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal(error.to_string())
    }
}
