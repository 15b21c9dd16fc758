//! Request DTOs for the auth API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use serde::Deserialize;

/// Request body for POST /api/auth/login
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    /// Key returned by GET /api/auth/captcha
    #[serde(default)]
    pub captcha_key: Option<String>,
    /// The user's answer to the captcha
    #[serde(default)]
    pub captcha_code: Option<String>,
}

impl LoginRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.username.is_empty() {
            return Some("Username cannot be empty".to_string());
        }
        if self.password.is_empty() {
            return Some("Password cannot be empty".to_string());
        }
        None
    }
}

/// Query string for the account lock endpoints
///
/// `ip` defaults to the caller's own address.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountQuery {
    pub username: String,
    #[serde(default)]
    pub ip: Option<String>,
}
