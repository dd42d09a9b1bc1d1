//! Logging setup for the server binary.

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// JSON lines instead of human-readable text.
    pub json_format: bool,
    /// Level used when `RUST_LOG` is not set.
    pub default_level: Level,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            json_format: false,
            default_level: Level::INFO,
        }
    }
}

/// Install the global subscriber. `RUST_LOG` takes precedence over
/// `default_level`. Calling this more than once has no effect.
pub fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_level.to_string()));

    // Ignore the error if a subscriber was already installed
    if config.json_format {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(true).with_target(true))
            .try_init();
    } else {
        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init();
    }
}
