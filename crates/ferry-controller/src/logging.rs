//! Logging setup and span helpers
//!
//! The subscriber is installed once per process. Components never hold a
//! logger; they log through `tracing` inside the span of the current pass.

use ferry_api::ObjectKey;
use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing::Span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset
///
/// Ferry crates log at `info`; HTTP and runtime crates only surface warnings.
pub const DEFAULT_FILTER: &str =
    "warn,ferry_api=info,ferry_inventory=info,ferry_webhook=info,ferry_controller=info";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines, one object per event with the pass span flattened in
    Json,
    /// Human readable, with a timing line when each pass span closes
    #[default]
    Pretty,
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber
///
/// Filtering follows `RUST_LOG`, falling back to [`DEFAULT_FILTER`]. Later
/// calls are no-ops, as is a call after another subscriber was installed.
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let registry = tracing_subscriber::registry();
        let installed = match format {
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(true)
                        .with_span_list(false)
                        .with_filter(env_filter()),
                )
                .try_init(),
            LogFormat::Pretty => registry
                .with(
                    fmt::layer()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_filter(env_filter()),
                )
                .try_init(),
        };
        if installed.is_err() {
            tracing::debug!("subscriber already installed");
        }
    });
}

/// Span for one reconciliation pass of a plan
///
/// `outcome` is left empty for the reconciler to fill in.
#[must_use]
pub fn reconcile_span(plan: &ObjectKey) -> Span {
    tracing::info_span!(
        "reconcile",
        namespace = %plan.namespace,
        plan = %plan.name,
        outcome = tracing::field::Empty,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_logging_twice_is_noop() {
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json);
    }

    #[test]
    fn default_filter_parses() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
    }

    #[test]
    fn log_format_from_toml_string() {
        #[derive(Deserialize)]
        struct Wrapper {
            format: LogFormat,
        }
        let parsed: Wrapper = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(parsed.format, LogFormat::Json);
    }
}
