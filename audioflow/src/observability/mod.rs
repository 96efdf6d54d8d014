//! Log subscriber setup.
//!
//! The library only emits `tracing` events; front ends call [`init_tracing`]
//! once at startup to route them somewhere.

use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "audioflow=info";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

/// Builds the subscriber without installing it.
#[must_use]
pub fn build_subscriber(format: LogFormat) -> Box<dyn Subscriber + Send + Sync> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => Box::new(registry.with(tracing_subscriber::fmt::layer())),
        LogFormat::Json => Box::new(
            registry.with(tracing_subscriber::fmt::layer().json().with_current_span(false)),
        ),
    }
}

/// Installs the global subscriber.
///
/// Honors `RUST_LOG`, falling back to [`DEFAULT_FILTER`].
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    tracing::subscriber::set_global_default(build_subscriber(format))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn test_scoped_subscriber_receives_events() {
        for format in [LogFormat::Text, LogFormat::Json] {
            let subscriber = build_subscriber(format);
            let ran = tracing::subscriber::with_default(subscriber, || {
                tracing::debug!(job_id = "scoped", "Scoped subscriber active");
                true
            });
            assert!(ran);
        }
    }
}
