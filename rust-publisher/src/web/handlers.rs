//! HTTP endpoint handlers for the order function app.

use std::sync::{Arc, LazyLock};

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Local, NaiveDate};
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::queue::{codec, JSON_CONTENT_TYPE};
use crate::web::jwt::JwtSigner;
use crate::Config;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@(.+)$").expect("email pattern is valid")
});

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub signer: Arc<JwtSigner>,
}

impl AppState {
    /// Build state, falling back to a per-process random secret when none is configured.
    pub fn new(config: Config) -> Self {
        let signer = match &config.jwt_secret {
            Some(secret) => JwtSigner::new(secret.as_bytes(), config.jwt_ttl_secs),
            None => JwtSigner::random(config.jwt_ttl_secs),
        };
        Self {
            config: Arc::new(config),
            signer: Arc::new(signer),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Hello
// =============================================================================

pub async fn hello() -> impl IntoResponse {
    info!("hello_requested");
    ([(header::CONTENT_TYPE, "text/plain")], "Hello World")
}

// =============================================================================
// Login
// =============================================================================

/// Login request body. Both fields are required.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Login endpoint.
///
/// Issues a token for any well-formed email address; the password is only
/// required to be present.
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    info!("login_received");

    let username = match payload {
        Ok(Json(LoginRequest {
            username: Some(username),
            password: Some(_),
        })) => username,
        Ok(_) => return bad_request("Please provide username and password"),
        Err(rejection) => {
            warn!(error = %rejection, "login_body_invalid");
            return bad_request("Please provide username and password");
        }
    };

    if !is_valid_email(&username) {
        warn!(username_length = username.len(), "login_invalid_email");
        return bad_request("Invalid email format");
    }

    let body = state
        .signer
        .issue(&username)
        .and_then(|token| codec::encode(&TokenResponse { token }).map_err(anyhow::Error::from));

    match body {
        Ok(body) => {
            info!(ttl_secs = state.config.jwt_ttl_secs, "login_token_issued");
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "login_token_failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn is_valid_email(username: &str) -> bool {
    EMAIL_PATTERN.is_match(username)
}

fn bad_request(message: &'static str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, "text/plain")],
        message,
    )
        .into_response()
}

// =============================================================================
// Daily Sales Report
// =============================================================================

/// Daily sales report with a simulated sales count between 1 and 100.
pub async fn daily_sales_report() -> impl IntoResponse {
    let sales: u32 = rand::thread_rng().gen_range(1..=100);
    let report = render_sales_report(Local::now().date_naive(), sales);

    info!(sales = sales, "daily_sales_report_generated");

    ([(header::CONTENT_TYPE, "text/plain")], report)
}

pub fn render_sales_report(date: NaiveDate, sales: u32) -> String {
    format!(
        "Daily Sales Report\nDate: {}\nTotal Sales: {}\nPerformance: {}",
        date.format("%Y-%m-%d"),
        sales,
        sales_performance(sales)
    )
}

pub fn sales_performance(sales: u32) -> &'static str {
    match sales {
        76.. => "Excellent day!",
        51..=75 => "Good day!",
        26..=50 => "Average day.",
        _ => "Below average day.",
    }
}
