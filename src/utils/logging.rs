//! Logging bootstrap for the `tcpsub` binary.

use std::str::FromStr;

use tracing::Level;

use crate::config::LoggingSettings;

/// Effective log level: `--debug` wins, then the configured level, then `info`.
pub fn level_for(settings: Option<&LoggingSettings>, debug: bool) -> Level {
    if debug {
        return Level::DEBUG;
    }
    settings
        .map(|s| parse_level(&s.level))
        .unwrap_or(Level::INFO)
}

/// Parse a level name, accepting `warning` as an alias. Unknown names fall
/// back to `info`.
pub fn parse_level(name: &str) -> Level {
    match name.trim().to_lowercase().as_str() {
        "warning" => Level::WARN,
        other => Level::from_str(other).unwrap_or(Level::INFO),
    }
}

/// Install the global fmt subscriber.
pub fn init(level: Level) {
    // try_init: tests and the binary may both call this
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init();
}
