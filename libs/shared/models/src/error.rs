use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

const GENERIC_SERVER_ERROR: &str = "Server error";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Auth(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_)
            | AppError::Conflict(_)
            | AppError::InvalidState(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the logs.
        let message = match &self {
            AppError::Database(msg) => {
                tracing::error!("Error: {}: {}", status, msg);
                GENERIC_SERVER_ERROR.to_string()
            }
            AppError::Auth(msg)
            | AppError::NotFound(msg)
            | AppError::ValidationError(msg)
            | AppError::Conflict(msg)
            | AppError::InvalidState(msg) => {
                tracing::debug!("Request rejected: {}: {}", status, msg);
                msg.clone()
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
