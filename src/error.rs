//!
//! # Custom Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the service.
//! Every failure a handler can produce is one of its variants, and each variant maps to
//! a fixed HTTP status code.
//!
//! `AppError` implements `actix_web::error::ResponseError`, rendering the
//! `{ "success": false, "error": { ... } }` envelope. Validation failures keep their
//! per-field messages so clients can show them next to the offending input.
//! `From` implementations for `sqlx::Error`, `validator::ValidationErrors`,
//! `jsonwebtoken::errors::Error` and `bcrypt::BcryptError` allow plain `?` in handlers.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::collections::BTreeMap;
use std::fmt;
use validator::ValidationErrors;

/// Field name to the list of messages produced for it.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// SQLSTATE raised by PostgreSQL on a unique constraint violation.
const UNIQUE_VIOLATION: &str = "23505";

/// Represents all possible errors that can occur within the service.
#[derive(Debug)]
pub enum AppError {
    /// Malformed or semantically invalid request (HTTP 400).
    BadRequest(String),
    /// Input validation failed (HTTP 400). Carries the aggregated field messages.
    ValidationError(FieldErrors),
    /// Authentication failed or is missing (HTTP 401).
    Unauthorized(String),
    /// Authenticated, but the account may not perform the action (HTTP 403).
    Forbidden(String),
    /// The requested resource does not exist (HTTP 404).
    NotFound(String),
    /// The request collides with existing state, such as a taken email (HTTP 409).
    Conflict(String),
    /// Unexpected server-side failure (HTTP 500).
    InternalServerError(String),
    /// Failure reported by the database driver (HTTP 500).
    DatabaseError(String),
}

impl AppError {
    /// Builds a validation error for a single field.
    pub fn invalid_field(field: &str, message: &str) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.to_string(), vec![message.to_string()]);
        AppError::ValidationError(fields)
    }

    fn client_message(&self) -> String {
        match self {
            AppError::BadRequest(msg)
            | AppError::Unauthorized(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg.clone(),
            AppError::ValidationError(_) => "Validation failed".to_string(),
            // Internal details stay in the log.
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                "Internal server error".to_string()
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            AppError::ValidationError(fields) => {
                let fields: Vec<&str> = fields.keys().map(String::as_str).collect();
                write!(f, "Validation Error: {}", fields.join(", "))
            }
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            AppError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            AppError::DatabaseError(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// Converts `AppError` variants into enveloped JSON responses.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InternalServerError(_) | AppError::DatabaseError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            log::error!("{}", self);
        }

        let error = match self {
            AppError::ValidationError(fields) => json!({
                "message": self.client_message(),
                "fields": fields,
            }),
            _ => json!({ "message": self.client_message() }),
        };

        HttpResponse::build(status).json(json!({
            "success": false,
            "error": error,
        }))
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `RowNotFound` becomes `NotFound`. Unique violations become `Conflict`, which covers
/// the race where two registrations pass the existence check at the same time.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match &error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                let message = match db.constraint() {
                    Some("users_email_key") => "Email already registered",
                    Some("users_username_key") => "Username already taken",
                    Some("users_google_id_key") => "Google account already linked",
                    _ => "Resource already exists",
                };
                AppError::Conflict(message.into())
            }
            _ => AppError::DatabaseError(error.to_string()),
        }
    }
}

/// Aggregates `validator::ValidationErrors` into per-field messages.
impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> AppError {
        let mut fields = FieldErrors::new();
        for (field, field_errors) in errors.field_errors() {
            let messages = field_errors
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("invalid ({})", e.code),
                })
                .collect();
            fields.insert(field.to_string(), messages);
        }
        AppError::ValidationError(fields)
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(error: jsonwebtoken::errors::Error) -> AppError {
        AppError::Unauthorized(format!("Invalid token: {}", error))
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::InternalServerError(error.to_string())
    }
}
