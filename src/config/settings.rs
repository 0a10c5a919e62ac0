use std::net::{Ipv4Addr, SocketAddrV4};

use serde::Deserialize;

use crate::utils::{Error, Result};

/// Top-level configuration settings for the application.
///
/// Includes settings for the listening server, the broker engine and logging.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub logging: LoggingSettings,
}

/// Configuration settings for the server.
///
/// Defines the IPv4 host and port the broker will bind to.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl ServerSettings {
    /// Resolve `host:port` into an IPv4 socket address.
    pub fn socket_addr(&self) -> Result<SocketAddrV4> {
        let ip: Ipv4Addr = self.host.parse().map_err(|_| {
            Error::InvalidArgument(format!("invalid IPv4 address: {}", self.host))
        })?;
        Ok(SocketAddrV4::new(ip, self.port))
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Configuration settings for the broker.
///
/// Controls connection admission, per-subscriber buffering and input limits.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    pub max_connections: usize,
    /// Frames buffered per connection before a subscriber counts as lagging.
    pub subscriber_queue_capacity: usize,
    pub max_frame_bytes: usize,
    pub max_topic_name_len: usize,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_connections: 1000,
            subscriber_queue_capacity: 1024,
            max_frame_bytes: 64 * 1024,
            max_topic_name_len: 256,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub max_connections: Option<usize>,
    pub subscriber_queue_capacity: Option<usize>,
    pub max_frame_bytes: Option<usize>,
    pub max_topic_name_len: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}
