//! Logging initialization.
//!
//! Structured logging through `tracing`, human-readable or JSON. Output goes
//! to stderr; stdout carries command output. `RUST_LOG` overrides the level
//! chosen here.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the global subscriber at `default_level`.
pub fn init(default_level: &str, json_format: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section, with CLI flags taking precedence.
pub fn init_from_config(config: &LoggingConfig, verbose: bool, json_logs: bool) {
    init(
        effective_level(config, verbose),
        json_logs || config.format == LogFormat::Json,
    );
}

/// `--verbose` raises the level to debug, never lowers it.
fn effective_level(config: &LoggingConfig, verbose: bool) -> &str {
    match (verbose, config.level.as_str()) {
        (true, "trace") => "trace",
        (true, _) => "debug",
        (false, level) => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            format: LogFormat::Pretty,
        }
    }

    #[test]
    fn configured_level_without_verbose() {
        assert_eq!(effective_level(&config("warn"), false), "warn");
    }

    #[test]
    fn verbose_selects_debug() {
        assert_eq!(effective_level(&config("info"), true), "debug");
        assert_eq!(effective_level(&config("error"), true), "debug");
    }

    #[test]
    fn verbose_keeps_trace() {
        assert_eq!(effective_level(&config("trace"), true), "trace");
    }
}
