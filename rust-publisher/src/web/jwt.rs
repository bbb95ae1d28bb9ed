//! HS256 JSON Web Tokens for the login endpoint.

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

/// Registered claims carried by login tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Authenticated username
    pub sub: String,
    /// Issued-at, Unix seconds
    pub iat: u64,
    /// Expiry, Unix seconds
    pub exp: u64,
}

/// Issues tokens with one shared secret.
pub struct JwtSigner {
    key: EncodingKey,
    ttl_secs: u64,
}

impl JwtSigner {
    pub fn new(secret: &[u8], ttl_secs: u64) -> Self {
        Self {
            key: EncodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Signer with a fresh 256-bit secret; tokens die with the process.
    pub fn random(ttl_secs: u64) -> Self {
        Self::new(&rand::random::<[u8; 32]>(), ttl_secs)
    }

    /// Issue a token for `subject`, valid from now.
    pub fn issue(&self, subject: &str) -> Result<String> {
        self.issue_at(subject, unix_now())
    }

    /// Issue a token as if the current time were `issued_at`.
    pub fn issue_at(&self, subject: &str, issued_at: u64) -> Result<String> {
        let claims = Claims {
            sub: subject.to_string(),
            iat: issued_at,
            exp: issued_at.saturating_add(self.ttl_secs),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.key).context("Failed to sign token")
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
