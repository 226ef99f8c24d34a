//! In-memory broker engine
//!
//! `MemoryBroker` is a small pull broker living entirely in process. It is
//! responsible for:
//! - managing topics and the subscriptions attached to them
//! - fanning published messages out to every attached subscription
//! - tracking pulled-but-unacknowledged messages and making them available
//!   again once their ack deadline passes
//! - injecting pull/publish/acknowledge failures on request
//!
//! Concurrency notes:
//! - All state sits behind one `std::sync::Mutex`. The lock is never held
//!   across an `.await`; pullers waiting for new messages park on a
//!   `tokio::sync::Notify` instead.
//! - A broker instance is scoped to one source subscription and one
//!   destination topic, mirroring `PubSubBroker`, but any subscription or
//!   topic can be seeded and inspected directly.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::broker::Broker;
use crate::broker::message::{AckId, Message, PublishToken};
use crate::broker::topic::{SubscriptionName, Topic};
use crate::utils::error::BrokerError;

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    payload: Vec<u8>,
    attributes: HashMap<String, String>,
    publish_time: String,
}

#[derive(Debug, Clone)]
struct PendingMessage {
    subscription: SubscriptionName,
    message: StoredMessage,
    sent_at: i64,
}

#[derive(Debug, Default)]
struct State {
    topics: HashMap<String, Topic>,
    backlogs: HashMap<SubscriptionName, VecDeque<StoredMessage>>,
    pending_acks: HashMap<String, PendingMessage>,
    failing_pulls: u32,
    failing_publishes: bool,
    failing_acknowledges: bool,
}

#[derive(Debug)]
pub struct MemoryBroker {
    source: SubscriptionName,
    destination: String,
    ack_deadline_ms: i64,
    state: Mutex<State>,
    arrivals: Notify,
    closed: AtomicBool,
}

impl MemoryBroker {
    /// Ack deadline applied when none is given, matching the Pub/Sub default.
    pub const DEFAULT_ACK_DEADLINE: Duration = Duration::from_secs(10);

    /// Create a broker pulling from `source` and publishing to `destination`.
    /// Neither needs to exist yet.
    pub fn new(source: &str, destination: &str) -> Self {
        Self::with_ack_deadline(source, destination, Self::DEFAULT_ACK_DEADLINE)
    }

    pub fn with_ack_deadline(source: &str, destination: &str, ack_deadline: Duration) -> Self {
        Self {
            source: source.to_string(),
            destination: destination.to_string(),
            ack_deadline_ms: ack_deadline.as_millis() as i64,
            state: Mutex::new(State::default()),
            arrivals: Notify::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Create `subscription` attached to `topic`, creating the topic if needed.
    pub fn create_subscription(&self, subscription: &str, topic: &str) {
        let mut state = self.lock();
        state
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| Topic::new(topic))
            .attach(subscription.to_string());
        state.backlogs.entry(subscription.to_string()).or_default();
    }

    /// Publish a raw payload to any topic. Used to seed subscriptions.
    pub fn publish_to(
        &self,
        topic: &str,
        payload: impl Into<Vec<u8>>,
        attributes: HashMap<String, String>,
    ) -> Result<PublishToken, BrokerError> {
        let stored = StoredMessage {
            message_id: Uuid::new_v4().to_string(),
            payload: payload.into(),
            attributes,
            publish_time: chrono::Utc::now().to_rfc3339(),
        };
        let token = PublishToken(stored.message_id.clone());

        {
            let mut state = self.lock();
            let subscriptions: Vec<SubscriptionName> = match state.topics.get(topic) {
                Some(t) => t.subscriptions.iter().cloned().collect(),
                None => {
                    return Err(BrokerError::Status {
                        status: 404,
                        message: format!("topic '{topic}' not found"),
                    });
                }
            };
            for sub in subscriptions {
                state
                    .backlogs
                    .entry(sub)
                    .or_default()
                    .push_back(stored.clone());
            }
        }

        self.arrivals.notify_waiters();
        Ok(token)
    }

    /// Payloads still owned by `subscription`: queued plus pulled but not
    /// yet acknowledged.
    pub fn outstanding(&self, subscription: &str) -> Vec<Vec<u8>> {
        let state = self.lock();
        let mut payloads: Vec<Vec<u8>> = state
            .backlogs
            .get(subscription)
            .map(|b| b.iter().map(|m| m.payload.clone()).collect())
            .unwrap_or_default();
        payloads.extend(
            state
                .pending_acks
                .values()
                .filter(|p| p.subscription == subscription)
                .map(|p| p.message.payload.clone()),
        );
        payloads
    }

    /// Make the next `count` pulls fail.
    pub fn fail_next_pulls(&self, count: u32) {
        self.lock().failing_pulls = count;
    }

    pub fn fail_publishes(&self, failing: bool) {
        self.lock().failing_publishes = failing;
    }

    pub fn fail_acknowledges(&self, failing: bool) {
        self.lock().failing_acknowledges = failing;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.is_closed() {
            return Err(BrokerError::Closed);
        }
        Ok(())
    }

    /// Time until the earliest pending message of the source subscription
    /// passes its ack deadline.
    fn until_next_expiry(&self) -> Option<Duration> {
        let state = self.lock();
        let now = chrono::Utc::now().timestamp_millis();
        state
            .pending_acks
            .values()
            .filter(|p| p.subscription == self.source)
            .map(|p| (p.sent_at + self.ack_deadline_ms + 1 - now).max(1))
            .min()
            .map(|ms| Duration::from_millis(ms as u64))
    }

    /// Move messages whose ack deadline passed back to the front of their
    /// subscription backlog.
    fn requeue_expired(&self, state: &mut State) {
        let now = chrono::Utc::now().timestamp_millis();
        let expired: Vec<String> = state
            .pending_acks
            .iter()
            .filter(|(_, p)| now - p.sent_at > self.ack_deadline_ms)
            .map(|(id, _)| id.clone())
            .collect();

        for ack_id in expired {
            if let Some(pending) = state.pending_acks.remove(&ack_id) {
                debug!(
                    "Ack deadline passed for message {}, redelivering",
                    pending.message.message_id
                );
                state
                    .backlogs
                    .entry(pending.subscription)
                    .or_default()
                    .push_front(pending.message);
            }
        }
    }

    fn try_take(&self) -> Result<Option<Message>, BrokerError> {
        let mut state = self.lock();
        self.requeue_expired(&mut state);

        if state.failing_pulls > 0 {
            state.failing_pulls -= 1;
            return Err(BrokerError::Injected("pull failed: broker unavailable".into()));
        }

        let Some(backlog) = state.backlogs.get_mut(&self.source) else {
            return Err(BrokerError::Status {
                status: 404,
                message: format!("subscription '{}' not found", self.source),
            });
        };
        let Some(stored) = backlog.pop_front() else {
            return Ok(None);
        };

        let ack_id = Uuid::new_v4().to_string();
        state.pending_acks.insert(
            ack_id.clone(),
            PendingMessage {
                subscription: self.source.clone(),
                message: stored.clone(),
                sent_at: chrono::Utc::now().timestamp_millis(),
            },
        );

        Ok(Some(Message {
            payload: stored.payload,
            attributes: stored.attributes,
            ack_id: AckId::new(ack_id),
            message_id: Some(stored.message_id),
            publish_time: Some(stored.publish_time),
        }))
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn pull(&self, timeout: Duration) -> Result<Option<Message>, BrokerError> {
        self.ensure_open()?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking so a publish between the
            // check and the wait is not missed.
            let arrived = self.arrivals.notified();
            tokio::pin!(arrived);
            arrived.as_mut().enable();

            if let Some(message) = self.try_take()? {
                return Ok(Some(message));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            // Wake early when a pending message becomes redeliverable.
            let wake = match self.until_next_expiry() {
                Some(wait) => (now + wait).min(deadline),
                None => deadline,
            };
            let _ = tokio::time::timeout_at(wake, arrived).await;
        }
    }

    async fn publish(&self, message: &Message) -> Result<PublishToken, BrokerError> {
        self.ensure_open()?;
        if self.lock().failing_publishes {
            return Err(BrokerError::Injected("publish failed: broker unavailable".into()));
        }
        self.publish_to(
            &self.destination,
            message.payload.clone(),
            message.attributes.clone(),
        )
    }

    async fn acknowledge(&self, ack_id: &AckId) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut state = self.lock();
        if state.failing_acknowledges {
            return Err(BrokerError::Injected(
                "acknowledge failed: broker unavailable".into(),
            ));
        }
        if state.pending_acks.remove(ack_id.as_str()).is_none() {
            // Expired or unknown ids are accepted silently by Pub/Sub too.
            warn!("Received ACK for unknown ack id: {ack_id}");
        }
        Ok(())
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Closed in-memory broker for {}", self.source);
        }
    }
}
