//! Telemetry and Observability
//!
//! Sets up `tracing-subscriber` for structured logging of dialogue turns,
//! calculations and run persistence. Logs always go to stderr: the chat
//! command uses stdout for the conversation itself.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human readable output
    Pretty,
    /// One JSON object per event, with the current span
    Json,
}

impl LogFormat {
    /// Pretty in debug builds, JSON in release builds
    pub fn for_build() -> Self {
        if cfg!(debug_assertions) {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

/// Filter directive for `log_level`, applied to the engine crate as well
fn default_directive(log_level: &str) -> String {
    format!("{},labbot_engine={}", log_level, log_level)
}

/// Initialize the tracing subscriber with the given log level
///
/// Priority: `RUST_LOG` env var > `log_level` parameter.
///
/// Only the first call installs a subscriber; later calls are no-ops, which
/// lets `main` initialize early and again once the config is loaded.
pub fn init_telemetry_with_level(log_level: &str, format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok(),
    };
}
