//! Web server module for the order function app.
//!
//! This module provides the HTTP side of the order system:
//! - A greeting and a health probe
//! - Email-based login issuing HS256 tokens
//! - A simulated daily sales report

pub mod handlers;
pub mod jwt;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{
    daily_sales_report, health, hello, login, AppState, HealthResponse, LoginRequest,
    TokenResponse,
};
pub use jwt::{Claims, JwtSigner};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/hello", get(hello))
        .route("/api/login", post(login))
        .route("/api/daily-sales-report", get(daily_sales_report))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
