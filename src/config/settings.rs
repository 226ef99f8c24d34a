use serde::Deserialize;

/// Top-level settings for a relocation run.
///
/// Includes broker connection settings, run defaults and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub pubsub: PubSubSettings,
    pub relocate: RelocateSettings,
    pub log: LogSettings,
}

/// Settings for the Cloud Pub/Sub REST client.
#[derive(Debug, Deserialize, Clone)]
pub struct PubSubSettings {
    pub endpoint: String,
    pub access_token: Option<String>,
    pub request_timeout_secs: u64,
}

/// Defaults for relocation runs. CLI flags take precedence.
#[derive(Debug, Deserialize, Clone)]
pub struct RelocateSettings {
    pub poll_timeout_secs: u64,
    pub pretty_json: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial settings loaded from files or environment.
///
/// Missing values are filled in from `Settings::default()`.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub pubsub: Option<PartialPubSubSettings>,
    pub relocate: Option<PartialRelocateSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPubSubSettings {
    pub endpoint: Option<String>,
    pub access_token: Option<String>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRelocateSettings {
    pub poll_timeout_secs: Option<u64>,
    pub pretty_json: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pubsub: PubSubSettings {
                endpoint: crate::broker::pubsub::DEFAULT_ENDPOINT.to_string(),
                access_token: None,
                request_timeout_secs: 30,
            },
            relocate: RelocateSettings {
                poll_timeout_secs: 5,
                pretty_json: false,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
