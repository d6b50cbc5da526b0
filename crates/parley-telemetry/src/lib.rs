//! Logging setup for Parley
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a fmt
//! layer in either human-readable or JSON form.

use parley_config::{LogFormat, TelemetryConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber
///
/// `RUST_LOG` takes precedence over the configured filter. An unparseable
/// filter falls back to `info` rather than silencing everything.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed
pub fn init(config: &TelemetryConfig) -> anyhow::Result<()> {
    let directive = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_filter.clone());
    let filter = build_filter(&directive);

    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Text => {
            let layer = tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false);
            registry.with(layer).try_init()?;
        }
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_target(true);
            registry.with(layer).try_init()?;
        }
    }

    Ok(())
}

fn build_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("invalid log filter '{directive}' ({e}), falling back to info");
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_falls_back() {
        let filter = build_filter("parley=notalevel");
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn valid_filter_is_kept() {
        let filter = build_filter("parley_llm=debug");
        assert_eq!(filter.to_string(), "parley_llm=debug");
    }
}
