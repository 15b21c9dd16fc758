//! API Handlers
//!
//! HTTP request handlers for the authentication endpoints. These are thin
//! consumers of the login protection and captcha services.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Query, State},
    http::HeaderMap,
    Json,
};
use tracing::{info, warn};

use crate::api::client_ip;
use crate::captcha::{CaptchaChallenge, CaptchaService};
use crate::config::Config;
use crate::error::{GuardError, Result};
use crate::login::{AccountLockInfo, LoginProtectionService};
use crate::models::{
    AccountQuery, HealthResponse, LoginRequest, LoginResponse, MessageResponse, StatsResponse,
};

/// Header carrying the admin token on the unlock and clear-cache endpoints.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Account the login endpoint checks credentials against.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub admin_username: String,
    pub admin_password: String,
    /// Whether login requires a valid captcha
    pub captcha_required: bool,
    /// Token for the admin endpoints; `None` disables them
    pub admin_token: Option<String>,
}

impl AuthSettings {
    /// Compares both fields without short-circuiting on the first mismatch.
    fn verify(&self, username: &str, password: &str) -> bool {
        let user_ok = constant_time_eq(&self.admin_username, username);
        let pass_ok = constant_time_eq(&self.admin_password, password);
        user_ok & pass_ok
    }

    /// Checks the admin token header. Always fails when no token is configured.
    fn authorize_admin(&self, headers: &HeaderMap) -> Result<()> {
        let Some(expected) = self.admin_token.as_deref() else {
            return Err(GuardError::Forbidden);
        };
        let presented = headers
            .get(ADMIN_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if constant_time_eq(expected, presented) {
            Ok(())
        } else {
            Err(GuardError::Forbidden)
        }
    }
}

impl From<&Config> for AuthSettings {
    fn from(config: &Config) -> Self {
        Self {
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password.clone(),
            captcha_required: config.captcha_required,
            admin_token: config.admin_token.clone(),
        }
    }
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub login: Arc<LoginProtectionService>,
    pub captcha: Arc<CaptchaService>,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    /// Creates a new AppState from already-built services.
    pub fn new(login: LoginProtectionService, captcha: CaptchaService, auth: AuthSettings) -> Self {
        Self {
            login: Arc::new(login),
            captcha: Arc::new(captcha),
            auth: Arc::new(auth),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Both services start their sweep tasks, so this must run inside a
    /// Tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let clock = Arc::new(crate::clock::SystemClock);
        let login = LoginProtectionService::with_settings(
            config.lockout_policy(),
            clock.clone(),
            config.sweep_interval(),
        );
        let captcha =
            CaptchaService::with_settings(config.captcha_settings(), clock, config.sweep_interval());
        Self::new(login, captcha, AuthSettings::from(config))
    }

    /// Stops the background sweeps of both caches.
    pub async fn shutdown(&self) {
        self.login.shutdown().await;
        self.captcha.shutdown().await;
    }
}

/// Handler for GET /api/auth/captcha
pub async fn captcha_handler(State(state): State<AppState>) -> Result<Json<CaptchaChallenge>> {
    let challenge = state.captcha.issue()?;
    Ok(Json(challenge))
}

/// Handler for POST /api/auth/login
///
/// Order matters: a locked identity is rejected before anything else is
/// checked, and every later rejection counts as a failed attempt.
pub async fn login_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(GuardError::InvalidRequest(error_msg));
    }

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let username = req.username.as_str();

    if state.login.is_account_locked(username, &ip) {
        let info = state.login.account_lock_info(username, &ip);
        return Err(GuardError::AccountLocked {
            remaining_minutes: info.remaining_lock_minutes,
        });
    }

    if state.auth.captcha_required {
        let key = req.captcha_key.as_deref().unwrap_or_default();
        let code = req.captcha_code.as_deref().unwrap_or_default();
        if !state.captcha.validate(key, code) {
            state.login.record_login_failure(username, &ip);
            return Err(GuardError::CaptchaRejected);
        }
    }

    if !state.auth.verify(username, &req.password) {
        state.login.record_login_failure(username, &ip);
        let remaining_attempts = state.login.remaining_attempts(username, &ip);
        warn!(username, ip = %ip, remaining_attempts, "Invalid credentials");
        return Err(GuardError::InvalidCredentials { remaining_attempts });
    }

    state.login.record_login_success(username, &ip);
    info!(username, ip = %ip, "User logged in");

    Ok(Json(LoginResponse::new(username, ip)))
}

/// Handler for GET /api/auth/account/lock-info
pub async fn lock_info_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<AccountQuery>,
) -> Json<AccountLockInfo> {
    let ip = query
        .ip
        .unwrap_or_else(|| client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)));
    Json(state.login.account_lock_info(&query.username, &ip))
}

/// Handler for POST /api/auth/account/unlock
///
/// Requires the admin token.
pub async fn unlock_handler(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    Query(query): Query<AccountQuery>,
) -> Result<Json<MessageResponse>> {
    if let Err(e) = state.auth.authorize_admin(&headers) {
        warn!(username = %query.username, "Rejected unlock without admin token");
        return Err(e);
    }

    let ip = query
        .ip
        .unwrap_or_else(|| client_ip(&headers, peer.map(|ConnectInfo(addr)| addr)));

    if state.login.unlock_account(&query.username, &ip) {
        Ok(Json(MessageResponse::new("Account unlocked")))
    } else {
        Err(GuardError::InvalidRequest(
            "Account is not locked or could not be unlocked".to_string(),
        ))
    }
}

/// Handler for GET /api/auth/stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        login_cache: state.login.cache_stats(),
        captcha_cache: state.captcha.cache_stats(),
    })
}

/// Handler for DELETE /api/auth/cache
///
/// Requires the admin token.
pub async fn clear_cache_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>> {
    if let Err(e) = state.auth.authorize_admin(&headers) {
        warn!("Rejected cache clear without admin token");
        return Err(e);
    }

    state.login.clear_all_cache();
    Ok(Json(MessageResponse::new("Login protection cache cleared")))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Constant-time string comparison to prevent timing attacks.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
