use eyre::{Result, WrapErr};
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::models::LogFormat;

/// Initialize structured logging with JSON output
pub fn init_tracing() -> Result<()> {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .try_init()
        .wrap_err("Failed to install JSON tracing subscriber")?;

    tracing::info!("Structured logging initialized");
    Ok(())
}

/// Initialize console-friendly logging for development and the CLI
pub fn init_console_tracing() -> Result<()> {
    Registry::default()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .wrap_err("Failed to install console tracing subscriber")?;
    Ok(())
}

/// Initialize tracing from a level directive and output format.
///
/// `RUST_LOG`, when set, wins over `level`.
pub fn init_tracing_with_config(level: &str, format: LogFormat, include_spans: bool) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level).wrap_err_with(|| format!("Invalid log level: {level}"))?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(
                fmt_layer
                    .json()
                    .with_current_span(include_spans)
                    .with_span_list(include_spans),
            )
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(true))
            .try_init(),
        LogFormat::Compact => Registry::default()
            .with(env_filter)
            .with(fmt_layer.compact())
            .try_init(),
    };
    installed.wrap_err("Failed to install tracing subscriber")?;

    tracing::debug!(level, ?format, "Logging initialized");
    Ok(())
}

/// Configure tracing for specific components (loader, cache, watcher)
pub fn configure_component_tracing(component: &str) -> tracing::Span {
    tracing::info_span!("component", name = component)
}

/// Span wrapping a single dispatch. `route` and `http.status_code` are
/// recorded once known.
pub fn create_dispatch_span(method: &str, path: &str) -> tracing::Span {
    tracing::debug_span!(
        "dispatch",
        http.method = method,
        http.path = path,
        route = tracing::field::Empty,
        http.status_code = tracing::field::Empty,
    )
}
