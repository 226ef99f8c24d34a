//! Run parameters for a single relocation.

use std::time::Duration;

use crate::broker::resource::ResourceName;
use crate::utils::error::ConfigError;

/// Source broker type accepted on the command line.
pub const SOURCE_TYPE_PUBSUB_SUBSCRIPTION: &str = "GCP_PUBSUB_SUBSCRIPTION";
/// Destination broker type accepted on the command line.
pub const DESTINATION_TYPE_PUBSUB_TOPIC: &str = "GCP_PUBSUB_TOPIC";

/// Immutable parameters of one run. `max_messages == 0` means unbounded.
#[derive(Debug, Clone)]
pub struct RelocationConfig {
    pub source: ResourceName,
    pub destination: ResourceName,
    pub max_messages: u64,
    pub poll_timeout: Duration,
    pub pretty_json: bool,
}

impl RelocationConfig {
    /// Validate broker types and resource names. Nothing is contacted.
    pub fn new(
        source_type: &str,
        source: &str,
        destination_type: &str,
        destination: &str,
        max_messages: u64,
        poll_timeout: Duration,
        pretty_json: bool,
    ) -> Result<Self, ConfigError> {
        if !source_type.eq_ignore_ascii_case(SOURCE_TYPE_PUBSUB_SUBSCRIPTION) {
            return Err(ConfigError::UnsupportedSourceType(source_type.to_string()));
        }
        if !destination_type.eq_ignore_ascii_case(DESTINATION_TYPE_PUBSUB_TOPIC) {
            return Err(ConfigError::UnsupportedDestinationType(
                destination_type.to_string(),
            ));
        }
        if poll_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "poll timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            source: ResourceName::parse_kind(source, "subscriptions")?,
            destination: ResourceName::parse_kind(destination, "topics")?,
            max_messages,
            poll_timeout,
            pretty_json,
        })
    }

    pub fn is_bounded(&self) -> bool {
        self.max_messages > 0
    }
}
