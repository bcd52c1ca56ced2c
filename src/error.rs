use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Test is not open for attempts: {0}")]
    WindowClosed(String),

    #[error("All {allowed} allowed attempts have been used")]
    AttemptsExhausted { allowed: i32 },

    #[error("Attempt {0} has already been submitted")]
    AlreadySubmitted(i64),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflicting concurrent update: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Upstream service error: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn window_closed(reason: impl std::fmt::Display) -> Self {
        Error::WindowClosed(reason.to_string())
    }

    pub fn not_found(what: &str, id: i64) -> Self {
        Error::NotFound(format!("{} {} not found", what, id))
    }

    /// Storage conflicts are the only errors the services retry on their own.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict(_))
    }

    fn code(&self) -> &'static str {
        match self {
            Error::Config(_) => "config_error",
            Error::InvalidPayload(_) | Error::Validation(_) | Error::Json(_) => "validation_error",
            Error::Unauthorized(_) => "unauthorized",
            Error::AccessDenied(_) => "access_denied",
            Error::WindowClosed(_) => "window_closed",
            Error::AttemptsExhausted { .. } => "attempts_exhausted",
            Error::AlreadySubmitted(_) => "already_submitted",
            Error::NotFound(_) => "not_found",
            Error::Conflict(_) => "conflict",
            Error::Upstream(_) => "upstream_error",
            Error::Database(_)
            | Error::Migrate(_)
            | Error::Internal(_)
            | Error::Io(_) => "internal_error",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Error::InvalidPayload(_)
            | Error::Validation(_)
            | Error::Json(_)
            | Error::AlreadySubmitted(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Error::AccessDenied(_) | Error::WindowClosed(_) | Error::AttemptsExhausted { .. } => {
                StatusCode::FORBIDDEN
            }
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Conflict(_) => StatusCode::CONFLICT,
            Error::Upstream(_) => StatusCode::BAD_GATEWAY,
            Error::Config(_)
            | Error::Database(_)
            | Error::Migrate(_)
            | Error::Internal(_)
            | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        let message = match &self {
            Error::Database(err) => {
                tracing::error!(error = ?err, "database failure");
                "An unexpected error occurred".to_string()
            }
            Error::Migrate(_) | Error::Internal(_) | Error::Io(_) | Error::Config(_) => {
                tracing::error!(error = %self, "internal failure");
                "An unexpected error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({ "error": self.code(), "message": message }));
        (status, body).into_response()
    }
}

// Postgres codes: unique_violation, serialization_failure, deadlock_detected, lock_not_available.
const CONFLICT_CODES: [&str; 4] = ["23505", "40001", "40P01", "55P03"];

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(ref db)
                if db
                    .code()
                    .map(|c| CONFLICT_CODES.contains(&c.as_ref()))
                    .unwrap_or(false) =>
            {
                Error::Conflict(db.message().to_string())
            }
            other => Error::Database(other),
        }
    }
}
