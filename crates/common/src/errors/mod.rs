//! Error types for JobBoard services
//!
//! Provides:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - Structured error responses with field-level validation details

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::SqlErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validation::{FieldErrors, SLUG_TAKEN, TITLE_TAKEN};

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidForm,
    InvalidUpload,
    PayloadTooLarge,

    // Authentication errors (2xxx)
    Unauthorized,
    InvalidCredentials,
    InvalidToken,
    ExpiredToken,

    // Authorization errors (3xxx)
    Forbidden,

    // Resource errors (4xxx)
    NotFound,
    JobNotFound,
    ResumeNotFound,
    PictureNotFound,

    // Conflict errors (5xxx)
    Conflict,

    // Rate limiting (6xxx)
    RateLimited,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,
    MigrationError,
    PersistenceFailed,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidForm => 1002,
            ErrorCode::InvalidUpload => 1003,
            ErrorCode::PayloadTooLarge => 1004,

            ErrorCode::Unauthorized => 2001,
            ErrorCode::InvalidCredentials => 2002,
            ErrorCode::InvalidToken => 2003,
            ErrorCode::ExpiredToken => 2004,

            ErrorCode::Forbidden => 3001,

            ErrorCode::NotFound => 4001,
            ErrorCode::JobNotFound => 4002,
            ErrorCode::ResumeNotFound => 4004,
            ErrorCode::PictureNotFound => 4005,

            ErrorCode::Conflict => 5001,

            ErrorCode::RateLimited => 6001,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,
            ErrorCode::MigrationError => 7003,
            ErrorCode::PersistenceFailed => 7004,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("The submitted form contains errors")]
    InvalidForm { errors: FieldErrors },

    #[error("{message}")]
    InvalidUpload { message: String },

    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    // Authentication errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("No matching job posting was found.")]
    JobNotFound { id: String },

    #[error("No matching resume was found.")]
    ResumeNotFound { id: String },

    #[error("No matching picture was found.")]
    PictureNotFound { id: String },

    // Conflict errors
    #[error("{message}")]
    Duplicate { message: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    /// A write the user asked for did not go through
    #[error("{message}")]
    Persistence { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidForm { .. } => ErrorCode::InvalidForm,
            AppError::InvalidUpload { .. } => ErrorCode::InvalidUpload,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::InvalidCredentials => ErrorCode::InvalidCredentials,
            AppError::InvalidToken => ErrorCode::InvalidToken,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Forbidden { .. } => ErrorCode::Forbidden,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::JobNotFound { .. } => ErrorCode::JobNotFound,
            AppError::ResumeNotFound { .. } => ErrorCode::ResumeNotFound,
            AppError::PictureNotFound { .. } => ErrorCode::PictureNotFound,
            AppError::Duplicate { .. } => ErrorCode::Conflict,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::Migration { .. } => ErrorCode::MigrationError,
            AppError::Persistence { .. } => ErrorCode::PersistenceFailed,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::InvalidForm { .. }
            | AppError::InvalidUpload { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthorized { .. }
            | AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Forbidden { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::JobNotFound { .. }
            | AppError::ResumeNotFound { .. }
            | AppError::PictureNotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Duplicate { .. } => StatusCode::CONFLICT,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Migration { .. }
            | AppError::Persistence { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Turn a failed write into a user-facing failure message.
    ///
    /// Unique constraint violations are mapped by constraint name, so the
    /// client never sees the driver's text.
    pub fn persistence(message: impl Into<String>, err: sea_orm::DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            tracing::warn!(detail = %detail, "Unique constraint violated");
            return AppError::unique_violation(&detail);
        }
        tracing::error!(error = %err, "Write failed");
        AppError::Persistence {
            message: message.into(),
        }
    }

    /// Map a unique violation to what the user can fix.
    ///
    /// `detail` is the driver message, which names the constraint:
    /// `uq_jobs_live_title`, `jobs_slug_key` or `users_email_key`.
    pub fn unique_violation(detail: &str) -> Self {
        let field = |field: &str, message: &str| {
            let mut errors = FieldErrors::default();
            errors.add(field, message);
            AppError::InvalidForm { errors }
        };

        if detail.contains("uq_jobs_live_title") {
            field("title", TITLE_TAKEN)
        } else if detail.contains("jobs_slug_key") {
            field("slug", SLUG_TAKEN)
        } else if detail.contains("users_email_key") {
            AppError::Duplicate {
                message: "An account with this email already exists.".to_string(),
            }
        } else {
            AppError::Duplicate {
                message: "This record already exists.".to_string(),
            }
        }
    }

    /// Like [`AppError::persistence`] for errors already lifted out of
    /// the repository; other variants pass through untouched.
    pub fn into_persistence(self, message: impl Into<String>) -> Self {
        match self {
            AppError::Database(err) => AppError::persistence(message, err),
            other => other,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidForm { errors } => serde_json::to_value(errors).ok(),
            AppError::Validation {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(_) | image::ImageError::Unsupported(_) => {
                AppError::InvalidUpload {
                    message: "The file must be an image.".to_string(),
                }
            }
            other => AppError::Internal {
                message: other.to_string(),
            },
        }
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::Migration {
            message: err.to_string(),
        }
    }
}
