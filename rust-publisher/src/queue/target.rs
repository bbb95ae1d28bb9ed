//! Connection target parsing.
//!
//! A target string picks the broker backend:
//! - `Endpoint=sb://...;SharedAccessKeyName=...;SharedAccessKey=...` (Service Bus)
//! - `https://<namespace>.servicebus.windows.net/<queue>` (bare Service Bus URL)
//! - `amqp://...` / `amqps://...` (AMQP 0-9-1 broker)

use std::fmt;

use tracing::debug;
use url::Url;

use crate::error::{PublishError, Result};

/// A parsed broker address.
#[derive(Debug, Clone)]
pub enum ConnectionTarget {
    ServiceBus(ServiceBusTarget),
    Amqp(Url),
}

/// Service Bus namespace address plus optional credential.
#[derive(Debug, Clone)]
pub struct ServiceBusTarget {
    /// Namespace root, always ending in `/`
    pub endpoint: Url,
    pub credential: Option<Credential>,
    /// Entity the credential is scoped to, if any
    pub entity_path: Option<String>,
}

/// Shared access credential for a Service Bus namespace or entity.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Policy name and key, used to sign fresh tokens
    SharedKey { name: String, key: String },
    /// Pre-issued `SharedAccessSignature sr=...` token
    Token(String),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::SharedKey { name, .. } => f
                .debug_struct("SharedKey")
                .field("name", name)
                .field("key", &"<redacted>")
                .finish(),
            Credential::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

impl ConnectionTarget {
    /// Parse a connection string, bare namespace URL, or AMQP URI.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(PublishError::Connection("connection target is empty".into()));
        }

        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("amqp://") || lower.starts_with("amqps://") {
            let url = Url::parse(raw)
                .map_err(|e| PublishError::Connection(format!("invalid AMQP URI: {e}")))?;
            return Ok(ConnectionTarget::Amqp(url));
        }

        let is_url = ["https://", "http://", "sb://"]
            .iter()
            .any(|scheme| lower.starts_with(scheme));

        if is_url && !raw.contains(';') {
            return parse_bare_url(raw).map(ConnectionTarget::ServiceBus);
        }

        parse_connection_string(raw).map(ConnectionTarget::ServiceBus)
    }

    /// Backend name, used as a structured log field.
    pub fn backend(&self) -> &'static str {
        match self {
            ConnectionTarget::ServiceBus(_) => "servicebus",
            ConnectionTarget::Amqp(_) => "amqp",
        }
    }
}

impl ServiceBusTarget {
    /// Fail if the credential is scoped to a different entity than `queue`.
    pub fn check_entity(&self, queue: &str) -> Result<()> {
        match &self.entity_path {
            Some(entity) if entity != queue => Err(PublishError::Connection(format!(
                "connection string is scoped to entity '{entity}', not queue '{queue}'"
            ))),
            _ => Ok(()),
        }
    }
}

fn parse_connection_string(raw: &str) -> Result<ServiceBusTarget> {
    let mut endpoint = None;
    let mut key_name = None;
    let mut key = None;
    let mut signature = None;
    let mut entity_path = None;

    for segment in raw.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, value) = segment.split_once('=').ok_or_else(|| {
            PublishError::Connection(format!("malformed connection string segment '{segment}'"))
        })?;
        let value = value.trim().to_string();

        match name.trim().to_ascii_lowercase().as_str() {
            "endpoint" => endpoint = Some(value),
            "sharedaccesskeyname" => key_name = Some(value),
            "sharedaccesskey" => key = Some(value),
            "sharedaccesssignature" => signature = Some(value),
            "entitypath" => entity_path = Some(value).filter(|v| !v.is_empty()),
            other => debug!(key = other, "connection_string_key_ignored"),
        }
    }

    let endpoint = endpoint
        .ok_or_else(|| PublishError::Connection("connection string has no Endpoint".into()))?;

    let credential = match (key_name, key, signature) {
        (Some(name), Some(key), None) if !name.is_empty() && !key.is_empty() => {
            Some(Credential::SharedKey { name, key })
        }
        (None, None, Some(token)) if !token.is_empty() => Some(Credential::Token(token)),
        (None, None, None) => None,
        _ => {
            return Err(PublishError::Connection(
                "connection string needs either SharedAccessKeyName and SharedAccessKey, or SharedAccessSignature".into(),
            ))
        }
    };

    Ok(ServiceBusTarget {
        endpoint: namespace_root(&endpoint)?.0,
        credential,
        entity_path,
    })
}

fn parse_bare_url(raw: &str) -> Result<ServiceBusTarget> {
    let (endpoint, entity_path) = namespace_root(raw)?;
    Ok(ServiceBusTarget {
        endpoint,
        credential: None,
        entity_path,
    })
}

/// Reduce an endpoint to `scheme://host[:port]/` and return its first path segment.
///
/// `sb://` is the AMQP-flavoured scheme Service Bus hands out; its HTTPS
/// interface lives at the same host.
fn namespace_root(raw: &str) -> Result<(Url, Option<String>)> {
    let parsed = Url::parse(raw)
        .map_err(|e| PublishError::Connection(format!("invalid endpoint '{raw}': {e}")))?;

    let scheme = match parsed.scheme() {
        "sb" | "https" => "https",
        "http" => "http",
        other => {
            return Err(PublishError::Connection(format!(
                "unsupported endpoint scheme '{other}'"
            )))
        }
    };

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| PublishError::Connection(format!("endpoint '{raw}' has no host")))?;

    let root = match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}/"),
        None => format!("{scheme}://{host}/"),
    };
    let endpoint = Url::parse(&root)
        .map_err(|e| PublishError::Connection(format!("invalid endpoint '{raw}': {e}")))?;

    let entity_path = parsed
        .path_segments()
        .and_then(|mut segments| segments.find(|s| !s.is_empty()))
        .map(str::to_string);

    Ok((endpoint, entity_path))
}
