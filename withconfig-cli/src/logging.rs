//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for the filter:
//! 1. `--log-level` / `WITH_CONFIG_LOG`
//! 2. `RUST_LOG`, when it parses as a filter
//! 3. `warn`
//!
//! Logs always go to stderr; stdout carries nothing but the child's output.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use crate::cli::LogLevel;

const DEFAULT_DIRECTIVE: &str = "warn";

pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = select_filter(cli_level, rust_log.as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to initialise logging: {}", e))
}

fn select_filter(cli_level: Option<LogLevel>, rust_log: Option<&str>) -> EnvFilter {
    if let Some(level) = cli_level {
        return EnvFilter::new(directive(level));
    }
    rust_log
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_DIRECTIVE))
}

fn directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_subscriber::filter::LevelFilter;

    #[test]
    fn test_cli_level_beats_rust_log() {
        let filter = select_filter(Some(LogLevel::Debug), Some("trace"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn test_rust_log_used_without_cli_level() {
        let filter = select_filter(None, Some("info"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::INFO));
    }

    #[test]
    fn test_defaults_to_warn() {
        assert_eq!(
            select_filter(None, None).max_level_hint(),
            Some(LevelFilter::WARN)
        );
    }
}
