//! Response DTOs for the auth API
//!
//! Defines the structure of outgoing HTTP response bodies. Challenge and
//! lock-info bodies are serialized straight from
//! [`CaptchaChallenge`](crate::captcha::CaptchaChallenge) and
//! [`AccountLockInfo`](crate::login::AccountLockInfo).

use serde::Serialize;

/// Response body for a successful login
#[derive(Debug, Clone, Serialize)]
pub struct LoginResponse {
    pub message: String,
    pub username: String,
    /// Address the login was attributed to
    pub ip: String,
}

impl LoginResponse {
    pub fn new(username: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            message: "Login successful".to_string(),
            username: username.into(),
            ip: ip.into(),
        }
    }
}

/// Generic acknowledgement body
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Response body for GET /api/auth/stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Summary of the login attempt cache
    pub login_cache: String,
    /// Summary of the captcha cache
    pub captcha_cache: String,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
