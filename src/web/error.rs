use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

/// Failures surfaced by the ingestion API. Bodies stay generic; details only
/// go to the log.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing or invalid authorization header")]
    MissingAuthorization,
    #[error("Invalid API key or inactive project")]
    InvalidApiKey,
    #[error("Failed to store metrics: {0}")]
    StoreMetrics(String),
    #[error("Failed to store error log: {0}")]
    StoreErrorLog(String),
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AppError::MissingAuthorization => (StatusCode::UNAUTHORIZED, "Missing or invalid authorization header"),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "Invalid API key or inactive project"),
            AppError::StoreMetrics(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store metrics"),
            AppError::StoreErrorLog(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Failed to store error log"),
            AppError::InvalidBody(_) | AppError::DatabaseError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed.");
        }
        (status, Json(serde_json::json!({ "error": error_message }))).into_response()
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidBody(err.to_string())
    }
}
