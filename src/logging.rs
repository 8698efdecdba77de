use std::path::Path;
use tracing_appender::rolling;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Used when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "info,sea_orm=warn,sqlx::query=warn";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Logs human-readable lines to stdout and JSON to `<log_dir>/<file_name>`,
/// rotated daily. Call once per process.
pub fn init_logging(log_dir: impl AsRef<Path>, file_name: &str) {
    let file_appender = rolling::daily(log_dir.as_ref(), file_name);
    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .json();

    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(file_layer)
        .with(stdout_layer)
        .init();
}
