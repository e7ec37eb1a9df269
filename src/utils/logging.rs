//! Structured logging setup.
//!
//! Installs a global `tracing-subscriber` registry built from a
//! [`LoggingConfig`]. `RUST_LOG` overrides the configured level.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::config::LoggingConfig;
use crate::error::{ProtocolError, Result};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Build the env filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level).into())
        .from_env_lossy()
}

/// Initialize the global subscriber.
///
/// Fails if a global subscriber is already installed, if the log file cannot
/// be opened, or if no output is enabled.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let layers = build_layers(config)?;

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter(config))
        .try_init()
        .map_err(|e| ProtocolError::ConfigError(format!("Failed to install subscriber: {e}")))?;

    tracing::info!(
        app = %config.app_name,
        level = %config.log_level,
        json = config.json_format,
        "Logging initialized"
    );
    Ok(())
}

fn build_layers(config: &LoggingConfig) -> Result<Vec<BoxedLayer>> {
    let mut layers: Vec<BoxedLayer> = Vec::new();

    if config.log_to_console {
        let layer = fmt::layer().with_target(true);
        layers.push(if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    if config.log_to_file {
        let path = config.log_file_path.as_deref().ok_or_else(|| {
            ProtocolError::ConfigError("log_file_path must be set when log_to_file is true".into())
        })?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open log file: {e}")))?;

        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(Arc::new(file));
        layers.push(if config.json_format {
            layer.json().boxed()
        } else {
            layer.boxed()
        });
    }

    if layers.is_empty() {
        return Err(ProtocolError::ConfigError(
            "At least one logging output (console or file) must be enabled".into(),
        ));
    }

    Ok(layers)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_console_only_builds_one_layer() {
        let layers = build_layers(&LoggingConfig::default()).unwrap();
        assert_eq!(layers.len(), 1);
    }

    #[test]
    fn test_no_outputs_rejected() {
        let config = LoggingConfig {
            log_to_console: false,
            ..LoggingConfig::default()
        };
        assert!(matches!(
            build_layers(&config),
            Err(ProtocolError::ConfigError(_))
        ));
    }

    #[test]
    fn test_file_output_requires_path() {
        let config = LoggingConfig {
            log_to_file: true,
            log_file_path: None,
            ..LoggingConfig::default()
        };
        assert!(build_layers(&config).is_err());
    }

    #[test]
    fn test_file_and_console_json() {
        let path = std::env::temp_dir().join(format!("yar-log-{}.log", std::process::id()));
        let config = LoggingConfig {
            log_to_file: true,
            log_file_path: Some(path.to_string_lossy().into_owned()),
            json_format: true,
            log_level: Level::DEBUG,
            ..LoggingConfig::default()
        };

        let layers = build_layers(&config).unwrap();
        assert_eq!(layers.len(), 2);
        assert!(path.exists());
        let _ = std::fs::remove_file(path);
    }
}
