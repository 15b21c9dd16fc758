//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::captcha::CaptchaSettings;
use crate::login::{LockoutPolicy, LOCK_DURATION};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Background sweep interval in seconds
    pub sweep_interval: u64,
    /// Failed logins before an identity is locked
    pub max_attempts: u32,
    /// Lock window in minutes
    pub lock_minutes: u64,
    /// Captcha validity in seconds
    pub captcha_ttl: u64,
    /// Characters per captcha code
    pub captcha_length: usize,
    /// Whether login requires a valid captcha
    pub captcha_required: bool,
    /// Administrator account name
    pub admin_username: String,
    /// Administrator password
    pub admin_password: String,
    /// Token required by the unlock and clear-cache endpoints; they are
    /// disabled when unset
    pub admin_token: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Cache sweep frequency in seconds (default: 60)
    /// - `LOGIN_MAX_ATTEMPTS` - Failures before lockout (default: 5)
    /// - `LOGIN_LOCK_MINUTES` - Lockout duration in minutes (default: 30)
    /// - `CAPTCHA_TTL` - Captcha validity in seconds (default: 300)
    /// - `CAPTCHA_LENGTH` - Captcha code length (default: 4)
    /// - `CAPTCHA_REQUIRED` - Require captcha on login (default: true)
    /// - `ADMIN_USERNAME` / `ADMIN_PASSWORD` - Login account (default: admin / admin)
    /// - `ADMIN_TOKEN` - Token for the admin endpoints (default: unset, endpoints disabled)
    ///
    /// Missing, unparseable or zero numeric values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: positive_env("SERVER_PORT").unwrap_or(defaults.server_port),
            sweep_interval: positive_env("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            max_attempts: positive_env("LOGIN_MAX_ATTEMPTS").unwrap_or(defaults.max_attempts),
            lock_minutes: positive_env("LOGIN_LOCK_MINUTES").unwrap_or(defaults.lock_minutes),
            captcha_ttl: positive_env("CAPTCHA_TTL").unwrap_or(defaults.captcha_ttl),
            captcha_length: positive_env("CAPTCHA_LENGTH").unwrap_or(defaults.captcha_length),
            captcha_required: env::var("CAPTCHA_REQUIRED")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.captcha_required),
            admin_username: env::var("ADMIN_USERNAME").unwrap_or(defaults.admin_username),
            admin_password: env::var("ADMIN_PASSWORD").unwrap_or(defaults.admin_password),
            admin_token: env::var("ADMIN_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
        }
    }

    /// Lockout thresholds for the login protection service.
    pub fn lockout_policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_attempts: self.max_attempts,
            lock_duration: self
                .lock_minutes
                .checked_mul(60)
                .map(Duration::from_secs)
                .unwrap_or(LOCK_DURATION),
        }
    }

    /// Settings for the captcha service.
    pub fn captcha_settings(&self) -> CaptchaSettings {
        CaptchaSettings {
            ttl: Duration::from_secs(self.captcha_ttl),
            code_length: self.captcha_length,
        }
    }

    /// Sweep interval for every cache.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            sweep_interval: 60,
            max_attempts: 5,
            lock_minutes: 30,
            captcha_ttl: 300,
            captcha_length: 4,
            captcha_required: true,
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            admin_token: None,
        }
    }
}

fn positive_env<T>(name: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    env::var(name)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .filter(|v| *v > T::default())
}
