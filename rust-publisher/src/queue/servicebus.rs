//! Service Bus backend over the HTTPS send endpoint.
//!
//! Each message is one `POST {namespace}/{queue}/messages`, authorized with
//! a SAS token scoped to `{namespace}/{queue}`. The broker answers `201
//! Created` once the message is durably enqueued.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Client, StatusCode,
};
use tracing::{info, warn};
use url::Url;

use super::broker::{validate_queue_name, Broker, BrokerConnection, QueueSender};
use super::target::{Credential, ServiceBusTarget};
use super::types::{OutboundMessage, Receipt};
use crate::error::{PublishError, Result};

/// Longest broker error body carried into an error message.
const MAX_ERROR_BODY: usize = 512;

/// Service Bus namespace reachable over HTTPS.
#[derive(Debug, Clone)]
pub struct ServiceBusBroker {
    target: ServiceBusTarget,
    request_timeout: Duration,
    token_ttl_secs: u64,
}

impl ServiceBusBroker {
    pub fn new(target: ServiceBusTarget, request_timeout: Duration, token_ttl_secs: u64) -> Self {
        Self {
            target,
            request_timeout,
            token_ttl_secs,
        }
    }
}

/// HTTP client bound to one namespace.
pub struct ServiceBusConnection {
    client: Client,
    endpoint: Url,
    credential: Option<Credential>,
    token_ttl_secs: u64,
}

/// Sender for one queue in the namespace.
pub struct ServiceBusSender {
    client: Client,
    queue: String,
    resource_uri: String,
    messages_url: Url,
    credential: Option<Credential>,
    token_ttl_secs: u64,
}

#[async_trait]
impl Broker for ServiceBusBroker {
    type Connection = ServiceBusConnection;

    async fn connect(&self) -> Result<ServiceBusConnection> {
        let client = Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| PublishError::Connection(format!("Failed to build HTTP client: {e}")))?;

        info!(
            endpoint = %self.target.endpoint,
            has_credential = self.target.credential.is_some(),
            "servicebus_client_ready"
        );

        Ok(ServiceBusConnection {
            client,
            endpoint: self.target.endpoint.clone(),
            credential: self.target.credential.clone(),
            token_ttl_secs: self.token_ttl_secs,
        })
    }
}

#[async_trait]
impl BrokerConnection for ServiceBusConnection {
    type Sender = ServiceBusSender;

    async fn open_sender(&self, queue: &str) -> Result<ServiceBusSender> {
        validate_queue_name(queue)?;

        let resource = entity_url(&self.endpoint, queue)?;
        let resource_uri = resource.to_string();
        let mut messages_url = resource;
        if let Ok(mut segments) = messages_url.path_segments_mut() {
            segments.push("messages");
        }

        info!(queue = queue, "servicebus_sender_opened");

        Ok(ServiceBusSender {
            client: self.client.clone(),
            queue: queue.to_string(),
            resource_uri,
            messages_url,
            credential: self.credential.clone(),
            token_ttl_secs: self.token_ttl_secs,
        })
    }

    async fn close(self) {
        drop(self.client);
        info!(endpoint = %self.endpoint, "servicebus_connection_closed");
    }
}

#[async_trait]
impl QueueSender for ServiceBusSender {
    async fn send(&self, message: &OutboundMessage) -> Result<Receipt> {
        let broker_properties = serde_json::json!({ "MessageId": message.message_id }).to_string();

        let mut request = self
            .client
            .post(self.messages_url.clone())
            .header(CONTENT_TYPE, message.content_type)
            .header("BrokerProperties", broker_properties)
            .body(message.body.clone());

        if let Some(credential) = &self.credential {
            let authorization = credential.authorization(&self.resource_uri, self.token_ttl_secs)?;
            request = request.header(AUTHORIZATION, authorization);
        }

        let response = request.send().await.map_err(classify_request_error)?;
        let status = response.status();

        if status.is_success() {
            info!(
                queue = %self.queue,
                message_id = %message.message_id,
                status_code = status.as_u16(),
                body_length = message.body.len(),
                "servicebus_message_sent"
            );
            return Ok(Receipt {
                message_id: message.message_id.clone(),
                queue: self.queue.clone(),
                body_length: message.body.len(),
            });
        }

        let detail = error_body(response).await;
        warn!(
            queue = %self.queue,
            status_code = status.as_u16(),
            detail = %detail,
            "servicebus_send_rejected"
        );

        Err(classify_status(status, &self.queue, &detail))
    }

    async fn close(self) {
        info!(queue = %self.queue, "servicebus_sender_closed");
    }
}

/// Address of `queue` under the namespace root.
///
/// Entity paths may nest with `/`, but every segment must be a literal name:
/// dot segments, query and fragment markers, and pre-escaped bytes would all
/// let the request land on a different entity.
fn entity_url(endpoint: &Url, queue: &str) -> Result<Url> {
    let invalid = |reason: &str| {
        PublishError::NotFound(format!("invalid queue name '{queue}': {reason}"))
    };

    if queue.contains(['?', '#', '%', '\\']) || queue.chars().any(char::is_control) {
        return Err(invalid("reserved character"));
    }

    let segments: Vec<&str> = queue.split('/').collect();
    if segments.iter().any(|s| s.is_empty() || *s == "." || *s == "..") {
        return Err(invalid("empty or dot path segment"));
    }

    let mut url = endpoint.clone();
    url.path_segments_mut()
        .map_err(|_| invalid("endpoint cannot hold a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Map a non-success HTTP status to the error taxonomy.
fn classify_status(status: StatusCode, queue: &str, detail: &str) -> PublishError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => PublishError::Connection(format!(
            "broker rejected credentials for queue '{queue}' ({status}): {detail}"
        )),
        StatusCode::NOT_FOUND => {
            PublishError::NotFound(format!("queue '{queue}' does not exist ({status}): {detail}"))
        }
        _ => PublishError::Transport(format!("send to queue '{queue}' failed ({status}): {detail}")),
    }
}

fn classify_request_error(e: reqwest::Error) -> PublishError {
    if e.is_connect() || e.is_builder() {
        PublishError::Connection(format!("Failed to reach broker: {e}"))
    } else {
        PublishError::Transport(format!("Failed to send message: {e}"))
    }
}

async fn error_body(response: reqwest::Response) -> String {
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }
    body
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use axum::{
        extract::{Path, State},
        http::{HeaderMap, StatusCode},
        routing::post,
        Router,
    };
    use tokio::net::TcpListener;

    use super::*;
    use crate::queue::{codec, publish_with_options, OrderMessage, PublishOptions};

    #[derive(Debug, Clone)]
    struct Received {
        content_type: String,
        authorization: Option<String>,
        broker_properties: String,
        body: String,
    }

    /// In-process stand-in for a namespace's send endpoint.
    #[derive(Clone, Default)]
    struct FakeNamespace {
        queues: Arc<Mutex<HashMap<String, Vec<Received>>>>,
        require_auth: bool,
    }

    impl FakeNamespace {
        fn with_queue(queue: &str) -> Self {
            let ns = FakeNamespace::default();
            ns.queues.lock().unwrap().insert(queue.to_string(), Vec::new());
            ns
        }

        fn received(&self, queue: &str) -> Vec<Received> {
            self.queues.lock().unwrap().get(queue).cloned().unwrap_or_default()
        }

        fn total(&self) -> usize {
            self.queues.lock().unwrap().values().map(Vec::len).sum()
        }
    }

    async fn receive(
        State(ns): State<FakeNamespace>,
        Path(queue): Path<String>,
        headers: HeaderMap,
        body: String,
    ) -> StatusCode {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let authorization = header("authorization");
        let authorized = authorization
            .as_deref()
            .map(|a| a.starts_with("SharedAccessSignature "))
            .unwrap_or(false);
        if ns.require_auth && !authorized {
            return StatusCode::UNAUTHORIZED;
        }

        let mut queues = ns.queues.lock().unwrap();
        match queues.get_mut(&queue) {
            Some(messages) => {
                messages.push(Received {
                    content_type: header("content-type").unwrap_or_default(),
                    authorization,
                    broker_properties: header("brokerproperties").unwrap_or_default(),
                    body,
                });
                StatusCode::CREATED
            }
            None => StatusCode::NOT_FOUND,
        }
    }

    async fn serve(ns: FakeNamespace) -> String {
        let app = Router::new()
            .route("/:queue/messages", post(receive))
            .with_state(ns);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn options() -> PublishOptions {
        PublishOptions {
            request_timeout: Duration::from_secs(5),
            token_ttl_secs: 300,
        }
    }

    #[tokio::test]
    async fn test_publish_enqueues_exact_body() {
        let ns = FakeNamespace::with_queue("lab1queue");
        let endpoint = serve(ns.clone()).await;
        let conn = format!("Endpoint={endpoint};SharedAccessKeyName=send;SharedAccessKey=secret");

        let receipt = publish_with_options(&conn, "lab1queue", &OrderMessage::sample(), &options())
            .await
            .unwrap();

        let received = ns.received("lab1queue");
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].body,
            r#"{"orderId": "ORD-123", "items": ["Laptop", "Mouse", "Keyboard"]}"#
        );
        assert_eq!(received[0].content_type, "application/json");
        assert_eq!(receipt.body_length, received[0].body.len());
        assert!(received[0].broker_properties.contains(&receipt.message_id));

        let decoded: OrderMessage = codec::decode(&received[0].body).unwrap();
        assert_eq!(decoded, OrderMessage::sample());
    }

    #[tokio::test]
    async fn test_publish_signs_queue_resource() {
        let ns = FakeNamespace {
            require_auth: true,
            ..FakeNamespace::with_queue("orders")
        };
        let endpoint = serve(ns.clone()).await;
        let conn = format!("Endpoint={endpoint};SharedAccessKeyName=send;SharedAccessKey=secret");

        publish_with_options(&conn, "orders", &OrderMessage::sample(), &options())
            .await
            .unwrap();

        let authorization = ns.received("orders")[0].authorization.clone().unwrap();
        let expected_sr: String =
            url::form_urlencoded::byte_serialize(format!("{endpoint}orders").as_bytes()).collect();
        assert!(authorization.contains(&format!("sr={expected_sr}&")));
        assert!(authorization.ends_with("&skn=send"));
    }

    #[tokio::test]
    async fn test_publish_missing_queue_is_not_found() {
        let ns = FakeNamespace::with_queue("lab1queue");
        let endpoint = serve(ns.clone()).await;
        let conn = format!("Endpoint={endpoint};SharedAccessKeyName=send;SharedAccessKey=secret");

        let err = publish_with_options(&conn, "missing", &OrderMessage::sample(), &options())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::NotFound(_)), "got {err:?}");
        assert_eq!(ns.total(), 0);
    }

    #[tokio::test]
    async fn test_publish_without_credentials_is_rejected() {
        let ns = FakeNamespace {
            require_auth: true,
            ..FakeNamespace::with_queue("lab1queue")
        };
        let endpoint = serve(ns.clone()).await;

        let err = publish_with_options(
            &format!("{endpoint}lab1queue"),
            "lab1queue",
            &OrderMessage::sample(),
            &options(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, PublishError::Connection(_)), "got {err:?}");
        assert_eq!(ns.total(), 0);
    }

    #[tokio::test]
    async fn test_publish_unreachable_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let conn = format!("Endpoint=http://{addr}/;SharedAccessKeyName=send;SharedAccessKey=secret");
        let err = publish_with_options(&conn, "lab1queue", &OrderMessage::sample(), &options())
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_publish_twice_enqueues_two_messages() {
        let ns = FakeNamespace::with_queue("lab1queue");
        let endpoint = serve(ns.clone()).await;
        let conn = format!("Endpoint={endpoint};SharedAccessKeyName=send;SharedAccessKey=secret");

        let first = publish_with_options(&conn, "lab1queue", &OrderMessage::sample(), &options())
            .await
            .unwrap();
        let second = publish_with_options(&conn, "lab1queue", &OrderMessage::sample(), &options())
            .await
            .unwrap();

        assert_eq!(ns.received("lab1queue").len(), 2);
        assert_ne!(first.message_id, second.message_id);
    }

    #[tokio::test]
    async fn test_publish_path_tricks_do_not_reach_other_queues() {
        let ns = FakeNamespace::with_queue("lab1queue");
        let endpoint = serve(ns.clone()).await;
        let conn = format!("Endpoint={endpoint};SharedAccessKeyName=send;SharedAccessKey=secret");

        for queue in [
            "nosuch/../lab1queue",
            "./lab1queue",
            "lab1queue/..",
            "%6cab1queue",
            "nosuch?x=lab1queue",
            "nosuch#lab1queue",
            "nosuch\\..\\lab1queue",
            "/lab1queue",
        ] {
            let err = publish_with_options(&conn, queue, &OrderMessage::sample(), &options())
                .await
                .unwrap_err();
            assert!(matches!(err, PublishError::NotFound(_)), "{queue:?} gave {err:?}");
        }

        assert_eq!(ns.total(), 0);
    }

    #[test]
    fn test_entity_url_nests_segments() {
        let endpoint = Url::parse("https://ns.servicebus.windows.net/").unwrap();

        assert_eq!(
            entity_url(&endpoint, "lab1queue").unwrap().as_str(),
            "https://ns.servicebus.windows.net/lab1queue"
        );
        assert_eq!(
            entity_url(&endpoint, "orders/eu west").unwrap().as_str(),
            "https://ns.servicebus.windows.net/orders/eu%20west"
        );
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "q", ""),
            PublishError::Connection(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::NOT_FOUND, "q", ""),
            PublishError::NotFound(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::SERVICE_UNAVAILABLE, "q", ""),
            PublishError::Transport(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYLOAD_TOO_LARGE, "q", ""),
            PublishError::Transport(_)
        ));
    }
}
