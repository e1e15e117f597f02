use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Request-terminal error taxonomy. Every failing operation maps to exactly
/// one of these; transactions roll back before the error leaves a service.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input or a business rule violation.
    #[error("{0}")]
    Validation(String),
    /// Caller's effective role does not permit the action.
    #[error("Unauthorized")]
    Forbidden,
    /// Resource absent, or not visible to the caller.
    #[error("Not found")]
    NotFound,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl Error {
    pub fn validation<S: Into<String>>(detail: S) -> Self {
        Error::Validation(detail.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// True when the database rejected the statement over a foreign key.
pub fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// True when the database rejected the statement over a unique constraint.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl From<validator::ValidationErrors> for Error {
    fn from(e: validator::ValidationErrors) -> Self {
        Error::Validation(e.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match self {
            Error::Database(ref e) => {
                error!("Database failure: {}", e);
                "Internal server error".to_string()
            }
            ref e => e.to_string(),
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
