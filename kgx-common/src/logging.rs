//! Tracing initialisation
//!
//! `RUST_LOG` takes precedence; otherwise the configured level applies to
//! every target. When `logging.file` is set, output goes to that file
//! (appended) instead of stderr.

use crate::config::LoggingConfig;
use crate::{Error, Result};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the env filter for a logging config
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str()))
}

/// Run `f` with a temporary stderr subscriber at `info`
///
/// Used while the configuration that decides the real subscriber is still
/// being read, so its warnings are not lost. `RUST_LOG` still applies.
pub fn with_bootstrap_logging<T>(f: impl FnOnce() -> T) -> T {
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing::subscriber::with_default(subscriber, f)
}

/// Install the global tracing subscriber
///
/// Returns an error if a global subscriber is already installed or the log
/// file cannot be opened.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config);

    match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;

            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()
                .map_err(|e| Error::Internal(format!("Tracing init failed: {}", e)))
        }
        None => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| Error::Internal(format!("Tracing init failed: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_logging_enables_warnings() {
        let enabled = with_bootstrap_logging(|| tracing::enabled!(tracing::Level::WARN));

        assert!(enabled);
    }
}
