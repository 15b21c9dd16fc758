//! API Routes
//!
//! Configures the Axum router with all authentication endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    captcha_handler, clear_cache_handler, health_handler, lock_info_handler, login_handler,
    stats_handler, unlock_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let auth = Router::new()
        .route("/captcha", get(captcha_handler))
        .route("/login", post(login_handler))
        .route("/account/lock-info", get(lock_info_handler))
        .route("/account/unlock", post(unlock_handler))
        .route("/stats", get(stats_handler))
        .route("/cache", delete(clear_cache_handler));

    Router::new()
        .nest("/api/auth", auth)
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
