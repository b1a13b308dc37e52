//! Tracing bootstrap for datalens binaries.
//!
//! Logs go to stderr; stdout carries command output only. Setting
//! `DATALENS_LOG_FORMAT=json` switches to one JSON object per event, which
//! is what the service deployment ships to its log collector.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, AppResult};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// `log_level` is any `EnvFilter` directive (`debug`,
/// `datalens_store=trace,info`, ...). Without it `RUST_LOG` is used, then
/// `info`. Calling this twice is a `Config` error.
///
/// ```no_run
/// datalens_core::logging::init_logging(Some("debug"), true)?;
/// # Ok::<(), datalens_core::AppError>(())
/// ```
pub fn init_logging(log_level: Option<&str>, no_color: bool) -> AppResult<()> {
    let filter = build_filter(log_level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let result = if json_requested() {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_ansi(!no_color && std::env::var_os("NO_COLOR").is_none()),
            )
            .try_init()
    };

    result.map_err(|e| AppError::Config(format!("Failed to init logging: {}", e)))
}

fn build_filter(log_level: Option<&str>) -> AppResult<EnvFilter> {
    let directives = match log_level {
        Some(level) => level.to_string(),
        None => std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string()),
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| AppError::Config(format!("Invalid log filter '{}': {}", directives, e)))
}

fn json_requested() -> bool {
    std::env::var("DATALENS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter() {
        assert!(build_filter(Some("debug")).is_ok());
        assert!(build_filter(Some("datalens_store=trace,info")).is_ok());
    }

    #[test]
    fn test_invalid_filter_is_config_error() {
        let result = init_logging(Some("datalens=loudest"), true);
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
