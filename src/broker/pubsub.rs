//! Cloud Pub/Sub broker client
//!
//! Talks to the Pub/Sub REST API (`v1`) with `reqwest`:
//! - `POST {endpoint}/v1/{subscription}:pull`
//! - `POST {endpoint}/v1/{topic}:publish`
//! - `POST {endpoint}/v1/{subscription}:acknowledge`
//!
//! Source and destination each get a connection handle. When both resources
//! live in the same project the handles alias one connection; `close` shuts
//! each distinct connection down exactly once.
//!
//! Authentication is a bearer token taken from settings or the
//! `GOOGLE_OAUTH_ACCESS_TOKEN` variable. Against the emulator
//! (`PUBSUB_EMULATOR_HOST`) no token is needed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::broker::Broker;
use crate::broker::message::{AckId, Message, PublishToken};
use crate::broker::resource::ResourceName;
use crate::utils::error::BrokerError;

pub const DEFAULT_ENDPOINT: &str = "https://pubsub.googleapis.com";

/// Pause between pull requests that came back empty before the poll deadline.
const EMPTY_PULL_PAUSE: Duration = Duration::from_millis(100);

/// Connection parameters shared by both handles.
#[derive(Debug, Clone)]
pub struct PubSubOptions {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub request_timeout: Duration,
}

impl Default for PubSubOptions {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            access_token: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Connection {
    scope: String,
    endpoint: String,
    access_token: Option<String>,
    http: RwLock<Option<reqwest::Client>>,
}

impl Connection {
    fn open(scope: &str, options: &PubSubOptions) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()?;
        debug!("Opened Pub/Sub connection for project {scope}");
        Ok(Self {
            scope: scope.to_string(),
            endpoint: options.endpoint.trim_end_matches('/').to_string(),
            access_token: options.access_token.clone(),
            http: RwLock::new(Some(http)),
        })
    }

    fn post(&self, resource: &ResourceName, verb: &str) -> Result<reqwest::RequestBuilder, BrokerError> {
        let http = self
            .http
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or(BrokerError::Closed)?;
        let url = format!("{}/v1/{}:{verb}", self.endpoint, resource.full());
        let request = http.post(url);
        Ok(match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    fn close(&self) {
        let mut http = self.http.write().unwrap_or_else(|e| e.into_inner());
        if http.take().is_some() {
            debug!("Closed Pub/Sub connection for project {}", self.scope);
        }
    }
}

#[derive(Debug)]
pub struct PubSubBroker {
    subscription: ResourceName,
    topic: ResourceName,
    source: Arc<Connection>,
    destination: Arc<Connection>,
    closed: AtomicBool,
}

impl PubSubBroker {
    /// Validate both resource names, then open the connection(s).
    ///
    /// Nothing touches the network until the first call; a malformed name
    /// fails here before any client is built.
    pub fn connect(
        subscription: &str,
        topic: &str,
        options: &PubSubOptions,
    ) -> Result<Self, BrokerError> {
        let subscription = ResourceName::parse_kind(subscription, "subscriptions")?;
        let topic = ResourceName::parse_kind(topic, "topics")?;

        let source = Arc::new(Connection::open(subscription.scope(), options)?);
        let destination = if subscription.scope() == topic.scope() {
            Arc::clone(&source)
        } else {
            Arc::new(Connection::open(topic.scope(), options)?)
        };

        Ok(Self {
            subscription,
            topic,
            source,
            destination,
            closed: AtomicBool::new(false),
        })
    }

    /// Whether source and destination share one connection.
    pub fn shares_connection(&self) -> bool {
        Arc::ptr_eq(&self.source, &self.destination)
    }

    /// One pull request bounded by `timeout`.
    async fn pull_once(&self, timeout: Duration) -> Result<Pulled, BrokerError> {
        let request = self
            .source
            .post(&self.subscription, "pull")?
            .timeout(timeout)
            .json(&PullRequest { max_messages: 1 });

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => return Ok(Pulled::Drained),
            Err(e) => return Err(e.into()),
        };
        let response = match check_status(response).await {
            Ok(response) => response,
            Err(e) if e.is_deadline_exceeded() => return Ok(Pulled::Drained),
            Err(e) => return Err(e),
        };
        let body: PullResponse = match response.json().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return Ok(Pulled::Drained),
            Err(e) => return Err(BrokerError::Decode(e.to_string())),
        };

        match body.received_messages.into_iter().next() {
            Some(received) => Ok(Pulled::Message(received.into_message()?)),
            None => Ok(Pulled::Empty),
        }
    }

    fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.source.close();
        if !self.shares_connection() {
            self.destination.close();
        }
    }
}

impl Drop for PubSubBroker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[async_trait]
impl Broker for PubSubBroker {
    async fn pull(&self, timeout: Duration) -> Result<Option<Message>, BrokerError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            match self.pull_once(remaining).await? {
                Pulled::Message(message) => return Ok(Some(message)),
                Pulled::Drained => return Ok(None),
                // Synchronous pull may come back empty while a backlog exists.
                Pulled::Empty => {
                    let left = deadline.saturating_duration_since(tokio::time::Instant::now());
                    tokio::time::sleep(EMPTY_PULL_PAUSE.min(left)).await;
                }
            }
        }
    }

    async fn publish(&self, message: &Message) -> Result<PublishToken, BrokerError> {
        let request = PublishRequest {
            messages: vec![OutgoingMessage {
                data: BASE64.encode(&message.payload),
                attributes: message.attributes.clone(),
            }],
        };
        let response = self
            .destination
            .post(&self.topic, "publish")?
            .json(&request)
            .send()
            .await?;
        let body: PublishResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| BrokerError::Decode(e.to_string()))?;

        body.message_ids
            .into_iter()
            .next()
            .map(PublishToken)
            .ok_or_else(|| BrokerError::Decode("publish response has no message id".into()))
    }

    async fn acknowledge(&self, ack_id: &AckId) -> Result<(), BrokerError> {
        let request = AcknowledgeRequest {
            ack_ids: vec![ack_id.as_str().to_string()],
        };
        let response = self
            .source
            .post(&self.subscription, "acknowledge")?
            .json(&request)
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn close(&self) {
        self.shutdown();
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, BrokerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(e) if e.error.status.is_empty() => e.error.message,
        Ok(e) => format!("{} ({})", e.error.message, e.error.status),
        Err(_) => body,
    };
    Err(BrokerError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Outcome of a single pull request.
enum Pulled {
    Message(Message),
    /// The response carried no message; the deadline has not passed yet.
    Empty,
    /// The request itself ran out of time.
    Drained,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PullRequest {
    max_messages: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullResponse {
    #[serde(default)]
    received_messages: Vec<ReceivedMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceivedMessage {
    ack_id: String,
    message: WireMessage,
}

impl ReceivedMessage {
    fn into_message(self) -> Result<Message, BrokerError> {
        let payload = BASE64
            .decode(self.message.data.as_bytes())
            .map_err(|e| BrokerError::Decode(format!("message data is not base64: {e}")))?;
        Ok(Message {
            payload,
            attributes: self.message.attributes,
            ack_id: AckId::new(self.ack_id),
            message_id: self.message.message_id,
            publish_time: self.message.publish_time,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    data: String,
    #[serde(default)]
    attributes: HashMap<String, String>,
    message_id: Option<String>,
    publish_time: Option<String>,
}

#[derive(Debug, Serialize)]
struct PublishRequest {
    messages: Vec<OutgoingMessage>,
}

#[derive(Debug, Serialize)]
struct OutgoingMessage {
    data: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    attributes: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishResponse {
    #[serde(default)]
    message_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AcknowledgeRequest {
    ack_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}
