//! Shared Access Signature tokens for Service Bus.
//!
//! A token authorizes requests against one resource URI until its expiry:
//!
//! ```text
//! SharedAccessSignature sr=<enc uri>&sig=<enc base64 hmac>&se=<expiry>&skn=<key name>
//! ```
//!
//! where the HMAC-SHA256 is computed with the shared key over `<enc uri>\n<expiry>`.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::target::Credential;
use crate::error::{PublishError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Build a SAS token for `resource_uri` that expires at `expiry` (Unix seconds).
pub fn generate_sas_token(resource_uri: &str, key_name: &str, key: &str, expiry: u64) -> Result<String> {
    let encoded_uri = form_encode(resource_uri);
    let string_to_sign = format!("{}\n{}", encoded_uri, expiry);

    let mut mac = HmacSha256::new_from_slice(key.as_bytes())
        .map_err(|e| PublishError::Connection(format!("invalid shared access key: {e}")))?;
    mac.update(string_to_sign.as_bytes());
    let signature = STANDARD.encode(mac.finalize().into_bytes());

    Ok(format!(
        "SharedAccessSignature sr={}&sig={}&se={}&skn={}",
        encoded_uri,
        form_encode(&signature),
        expiry,
        key_name
    ))
}

/// Unix time `ttl_secs` from now.
pub fn expiry_from_now(ttl_secs: u64) -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
        .saturating_add(ttl_secs)
}

impl Credential {
    /// `Authorization` header value for requests against `resource_uri`.
    pub fn authorization(&self, resource_uri: &str, ttl_secs: u64) -> Result<String> {
        match self {
            Credential::SharedKey { name, key } => {
                generate_sas_token(resource_uri, name, key, expiry_from_now(ttl_secs))
            }
            Credential::Token(token) => Ok(token.clone()),
        }
    }
}

fn form_encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
