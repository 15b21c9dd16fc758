//! API Module
//!
//! HTTP handlers and routing for the authentication REST API.
//!
//! # Endpoints
//! - `GET /api/auth/captcha` - Issue a captcha challenge
//! - `POST /api/auth/login` - Log in, subject to lockout
//! - `GET /api/auth/account/lock-info` - Inspect an identity's lock state
//! - `POST /api/auth/account/unlock` - Clear a lock
//! - `GET /api/auth/stats` - Cache statistics
//! - `DELETE /api/auth/cache` - Forget all tracked attempts
//! - `GET /health` - Health check endpoint

pub mod client_ip;
pub mod handlers;
pub mod routes;

pub use client_ip::client_ip;
pub use handlers::*;
pub use routes::create_router;
