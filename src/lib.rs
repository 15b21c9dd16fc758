//! Login Guard - brute-force protection for a login endpoint
//!
//! Tracks failed logins per username and source address in an in-memory
//! TTL cache, locks identities that fail too often, and serves captcha
//! challenges from the same cache machinery.

pub mod api;
pub mod cache;
pub mod captcha;
pub mod clock;
pub mod config;
pub mod error;
pub mod login;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState};
pub use cache::TtlCache;
pub use captcha::CaptchaService;
pub use config::Config;
pub use login::LoginProtectionService;
