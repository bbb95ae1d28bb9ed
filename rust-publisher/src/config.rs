//! Configuration module for environment variable parsing.
//!
//! Every setting has a default, so both binaries run with no environment at
//! all and target the lab namespace and queue.

use std::env;
use std::str::FromStr;

use tracing::warn;

/// Default broker target, a bare namespace URL scoped to the lab queue.
pub const DEFAULT_CONNECTION_STR: &str = "https://BusFor8917LabOne.servicebus.windows.net/lab1queue";

/// Default destination queue.
pub const DEFAULT_QUEUE_NAME: &str = "lab1queue";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Service Bus connection string, bare namespace URL, or AMQP URI
    pub connection_str: String,

    /// Queue the sender publishes to
    pub queue_name: String,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,

    /// Lifetime of generated SAS tokens in seconds
    pub sas_token_ttl_secs: u64,

    // =========================================================================
    // Web Server Configuration
    // =========================================================================

    /// Port for the web server to listen on
    pub port: u16,

    /// HS256 signing secret for login tokens; random per process when unset
    pub jwt_secret: Option<String>,

    /// Lifetime of login tokens in seconds
    pub jwt_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            connection_str: DEFAULT_CONNECTION_STR.to_string(),
            queue_name: DEFAULT_QUEUE_NAME.to_string(),
            request_timeout_ms: 30_000,
            sas_token_ttl_secs: 3600,
            port: 8080,
            jwt_secret: None,
            jwt_ttl_secs: 3600,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            connection_str: env::var("SERVICEBUS_CONNECTION_STR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.connection_str),

            queue_name: env::var("SERVICEBUS_QUEUE_NAME")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.queue_name),

            request_timeout_ms: parse_number("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),

            sas_token_ttl_secs: parse_number("SAS_TOKEN_TTL_SECS", defaults.sas_token_ttl_secs),

            port: parse_number("PORT", defaults.port),

            jwt_secret: env::var("JWT_SECRET").ok().filter(|v| !v.is_empty()),

            jwt_ttl_secs: parse_number("JWT_TTL_SECS", defaults.jwt_ttl_secs),
        }
    }
}

/// Parse a numeric variable, keeping the default when unset or invalid.
fn parse_number<T: FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}
