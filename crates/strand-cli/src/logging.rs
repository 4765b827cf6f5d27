//! Logging Initialization
//!
//! tracing-subscriber registry with an `EnvFilter` and one fmt layer.

use strand_core::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// `RUST_LOG` overrides `config.level`.
pub fn init_logging(config: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let fmt_layer = match config.format.as_str() {
        "json" => fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .boxed(),
        "compact" => fmt::layer()
            .compact()
            .with_target(true)
            .with_thread_names(true)
            .boxed(),
        _ => fmt::layer()
            .with_target(true)
            .with_thread_names(true)
            .with_ansi(true)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!(
        target: "strand::init",
        level = %config.level,
        format = %config.format,
        "logging initialized"
    );
}
