use std::collections::HashMap;
use std::fmt;

/// Opaque acknowledgment handle.
///
/// Only meaningful to the subscription the message was pulled from; it is
/// never forwarded when a message is published elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckId(String);

impl AckId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Broker confirmation of a durable publish (the id assigned to the copy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishToken(pub String);

/// A message pulled from a subscription.
///
/// # Fields
///
/// - `payload` - Raw message body. May or may not be valid UTF-8.
/// - `attributes` - Unordered string key/value pairs set by the publisher.
/// - `ack_id` - Handle used to acknowledge the message on its source subscription.
/// - `message_id` - Broker-assigned id of the message, when known.
/// - `publish_time` - Broker publish timestamp as reported (RFC 3339), when known.
#[derive(Debug, Clone)]
pub struct Message {
    pub payload: Vec<u8>,
    pub attributes: HashMap<String, String>,
    pub ack_id: AckId,
    pub message_id: Option<String>,
    pub publish_time: Option<String>,
}

impl Message {
    pub fn new(payload: impl Into<Vec<u8>>, ack_id: AckId) -> Self {
        Self {
            payload: payload.into(),
            attributes: HashMap::new(),
            ack_id,
            message_id: None,
            publish_time: None,
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Attributes sorted by key, for stable display.
    pub fn sorted_attributes(&self) -> Vec<(&str, &str)> {
        let mut attrs: Vec<_> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        attrs.sort_unstable();
        attrs
    }
}
