mod relocation;
mod settings;

use std::time::Duration;

use crate::broker::pubsub::PubSubOptions;
use crate::config::settings::PartialSettings;
use config::{Config, Environment, File};

pub use relocation::{
    DESTINATION_TYPE_PUBSUB_TOPIC, RelocationConfig, SOURCE_TYPE_PUBSUB_SUBSCRIPTION,
};
pub use settings::{LogSettings, PubSubSettings, RelocateSettings, Settings};

use crate::utils::error::ConfigError;

/// Environment variable naming a Pub/Sub emulator `host:port`.
pub const EMULATOR_HOST_VAR: &str = "PUBSUB_EMULATOR_HOST";
/// Environment variable holding an OAuth bearer token.
pub const ACCESS_TOKEN_VAR: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";

/// Loads settings from `config/default` (optional) and `RELOCATE__*`
/// environment variables, merged over `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::with_prefix("RELOCATE").separator("__"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    Ok(Settings {
        pubsub: PubSubSettings {
            endpoint: partial
                .pubsub
                .as_ref()
                .and_then(|p| p.endpoint.clone())
                .unwrap_or(default.pubsub.endpoint),
            access_token: partial
                .pubsub
                .as_ref()
                .and_then(|p| p.access_token.clone())
                .or(default.pubsub.access_token),
            request_timeout_secs: partial
                .pubsub
                .as_ref()
                .and_then(|p| p.request_timeout_secs)
                .unwrap_or(default.pubsub.request_timeout_secs),
        },
        relocate: RelocateSettings {
            poll_timeout_secs: partial
                .relocate
                .as_ref()
                .and_then(|r| r.poll_timeout_secs)
                .unwrap_or(default.relocate.poll_timeout_secs),
            pretty_json: partial
                .relocate
                .as_ref()
                .and_then(|r| r.pretty_json)
                .unwrap_or(default.relocate.pretty_json),
        },
        log: LogSettings {
            level: partial
                .log
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
        },
    })
}

impl Settings {
    /// Broker client options, honouring the emulator and token variables.
    pub fn pubsub_options(&self) -> PubSubOptions {
        let endpoint = match std::env::var(EMULATOR_HOST_VAR) {
            Ok(host) if !host.is_empty() => format!("http://{host}"),
            _ => self.pubsub.endpoint.clone(),
        };
        let access_token = self
            .pubsub
            .access_token
            .clone()
            .or_else(|| std::env::var(ACCESS_TOKEN_VAR).ok().filter(|t| !t.is_empty()));

        PubSubOptions {
            endpoint,
            access_token,
            request_timeout: Duration::from_secs(self.pubsub.request_timeout_secs),
        }
    }
}
