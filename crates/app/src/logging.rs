use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::state::AppState;

const FALLBACK_LOG_LEVEL: &str = "info";

/// Pick the default log directive: `--log-level`, then the config's
/// `log_level`, then `info`
pub fn log_level(explicit: Option<String>, state: Option<&AppState>) -> String {
    explicit
        .or_else(|| state.map(|s| s.config.log_level.clone()))
        .unwrap_or_else(|| FALLBACK_LOG_LEVEL.to_string())
}

/// Initialize logging to stderr, keeping stdout for command output.
/// Returns a guard that must be kept alive for the duration of the program.
pub fn init_logging(level: &str) -> tracing_appender::non_blocking::WorkerGuard {
    let (stderr_writer, guard) = tracing_appender::non_blocking(std::io::stderr());

    // RUST_LOG wins over the default directive
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(FALLBACK_LOG_LEVEL));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_filter(env_filter);

    tracing_subscriber::registry().with(stderr_layer).init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_precedence() {
        assert_eq!(log_level(Some("debug".into()), None), "debug");
        assert_eq!(log_level(None, None), "info");
    }
}
