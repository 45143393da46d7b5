//! Logging initialisation.
//!
//! Development builds log human-readable, coloured lines; production logs one
//! JSON object per event. Both go through a non-blocking stdout writer whose
//! guard must be held for the lifetime of the process.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::{Error, Result};

/// Default log filter directive in development.
pub const DEFAULT_LOG_FILTER: &str = "notification_server=debug,sqlx=warn,rdkafka=info";

/// Default log filter directive in production.
pub const DEFAULT_PRODUCTION_LOG_FILTER: &str = "notification_server=info,sqlx=warn,rdkafka=info";

/// Build the filter from the configured directive, falling back to the mode default.
pub fn build_filter(config: &AppConfig) -> Result<EnvFilter> {
    let directive = match &config.log_filter {
        Some(directive) => directive.as_str(),
        None if config.development => DEFAULT_LOG_FILTER,
        None => DEFAULT_PRODUCTION_LOG_FILTER,
    };
    EnvFilter::try_new(directive)
        .map_err(|e| Error::config(format!("invalid log filter '{directive}': {e}")))
}

/// Install the global subscriber.
///
/// Keep the returned guard alive; dropping it flushes and stops the writer.
pub fn init_logging(config: &AppConfig) -> Result<WorkerGuard> {
    let filter = build_filter(config)?;
    let (writer, guard) = tracing_appender::non_blocking(std::io::stdout());

    let layer = if config.development {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(true)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .json()
            .with_writer(writer)
            .with_current_span(true)
            .with_span_list(false)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| Error::Other(format!("Failed to set global default subscriber: {e}")))?;

    Ok(guard)
}
