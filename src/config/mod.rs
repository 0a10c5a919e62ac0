mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LoggingSettings, ServerSettings, Settings};

/// Loads the configuration from the default file and environment variables.
///
/// Sources, later ones winning: `config/default.{toml,json,yaml,..}` (optional),
/// then `TCPSUB__<SECTION>__<KEY>` environment variables. Anything left
/// unspecified falls back to `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("TCPSUB")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;
    let default = Settings::default();

    Ok(Settings {
        server: ServerSettings {
            host: partial
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: partial
                .server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            max_connections: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_connections)
                .unwrap_or(default.broker.max_connections),
            subscriber_queue_capacity: partial
                .broker
                .as_ref()
                .and_then(|b| b.subscriber_queue_capacity)
                .unwrap_or(default.broker.subscriber_queue_capacity),
            max_frame_bytes: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_frame_bytes)
                .unwrap_or(default.broker.max_frame_bytes),
            max_topic_name_len: partial
                .broker
                .as_ref()
                .and_then(|b| b.max_topic_name_len)
                .unwrap_or(default.broker.max_topic_name_len),
        },
        logging: LoggingSettings {
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    })
}
