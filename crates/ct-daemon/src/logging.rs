//! Structured logging setup for the triage daemon.
//!
//! Dual-mode logging in the service's two habitats:
//! - Human-readable console output when run by hand
//! - Machine-parseable JSON when supervised by the process manager
//!
//! All log output goes to stderr; stdout is reserved for command
//! payloads (`check`, `version`). The filter respects `CT_LOG` first,
//! then `RUST_LOG`, then the verbosity flags.

use clap::ValueEnum;
use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable console output.
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

/// Logging configuration assembled from CLI flags.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Default filter directive when no environment filter is set.
    pub default_filter: String,
}

impl LogConfig {
    /// Build from the shared CLI verbosity flags.
    pub fn from_flags(format: LogFormat, verbose: u8, quiet: bool) -> Self {
        let level = if quiet {
            "warn"
        } else {
            match verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        };
        Self {
            format,
            default_filter: format!("ct_daemon={level},ct_backend={level},ct_report={level}"),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::from_flags(LogFormat::Human, 0, false)
    }
}

/// Initialize the logging subsystem.
///
/// Must be called once at startup before any logging occurs.
/// Respects environment variables CT_LOG and RUST_LOG.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_from_env("CT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    match config.format {
        LogFormat::Human => {
            let use_ansi = std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .init();
        }
        LogFormat::Json => {
            let json_layer = fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .with_current_span(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .init();
        }
    }
}
