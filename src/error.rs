//! Error types for the login guard
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Guard Error Enum ==
/// Unified error type for the caches, the login flow and the HTTP layer.
#[derive(Error, Debug)]
pub enum GuardError {
    /// A cache write was given a zero time-to-live
    #[error("Invalid TTL: {0:?} (must be greater than zero)")]
    InvalidTtl(Duration),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The identity is inside its lockout window
    #[error("Account locked, retry in {remaining_minutes} minutes")]
    AccountLocked { remaining_minutes: i64 },

    /// One-time code missing, expired or wrong
    #[error("Captcha is invalid or has expired")]
    CaptchaRejected,

    /// Username or password did not match
    #[error("Invalid username or password, {remaining_attempts} attempts remaining")]
    InvalidCredentials { remaining_attempts: u32 },

    /// Admin endpoint called without a valid admin token
    #[error("Admin token missing or invalid")]
    Forbidden,

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for GuardError {
    fn into_response(self) -> Response {
        let status = match &self {
            GuardError::InvalidTtl(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GuardError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GuardError::AccountLocked { .. } => StatusCode::LOCKED,
            GuardError::CaptchaRejected => StatusCode::BAD_REQUEST,
            GuardError::InvalidCredentials { .. } => StatusCode::UNAUTHORIZED,
            GuardError::Forbidden => StatusCode::FORBIDDEN,
            GuardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the login guard.
pub type Result<T> = std::result::Result<T, GuardError>;
