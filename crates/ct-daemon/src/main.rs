//! ct-daemon - crash triage daemon.
//!
//! Entry point wiring:
//! - CLI parsing and config resolution (CLI > env > defines > default)
//! - Logging to stderr, human or JSON
//! - `serve`: bind the socket and run the listener until terminated
//! - `check`: resolve and print the effective configuration

use clap::{Args, Parser, Subcommand};
use ct_backend::ptrace::PtraceBackend;
use ct_daemon::config::{resolve_config, ConfigOptions, ResolvedConfig};
use ct_daemon::listener::TriageServer;
use ct_daemon::logging::{init_logging, LogConfig, LogFormat};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

/// Crash triage daemon: receives crash notifications over a Unix
/// socket and writes per-process stack trace reports.
#[derive(Parser)]
#[command(name = "ct-daemon")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Path to the process manager's defines file (JSON)
    #[arg(long, global = true)]
    defines: Option<PathBuf>,

    /// Unix socket path to listen on
    #[arg(long, global = true)]
    socket: Option<PathBuf>,

    /// Directory for crash reports
    #[arg(long, global = true)]
    report_dir: Option<PathBuf>,

    /// Log format for stderr
    #[arg(long, global = true, default_value = "human")]
    log_format: LogFormat,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon (default)
    Serve,

    /// Resolve and print the effective configuration
    Check,

    /// Print version information
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(&LogConfig::from_flags(
        cli.global.log_format,
        cli.global.verbose,
        cli.global.quiet,
    ));

    let options = ConfigOptions {
        socket: cli.global.socket.clone(),
        report_dir: cli.global.report_dir.clone(),
        defines: cli.global.defines.clone(),
    };
    let resolved = match resolve_config(&options) {
        Ok(resolved) => resolved,
        Err(err) => {
            error!(code = err.code(), error = %err, "configuration error");
            return ExitCode::from(2);
        }
    };

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_serve(&resolved),
        Commands::Check => run_check(&resolved),
        Commands::Version => {
            println!("ct-daemon {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
    }
}

fn run_serve(resolved: &ResolvedConfig) -> ExitCode {
    let backend = Arc::new(PtraceBackend::new());
    let server = match TriageServer::bind(
        &resolved.config.socket_path,
        &resolved.config.report_dir,
        backend,
    ) {
        Ok(server) => server,
        Err(err) => {
            error!(code = err.code(), error = %err, "failed to bind socket");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = server.serve() {
        error!(code = err.code(), error = %err, "listener failed");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

/// Print the resolved configuration with provenance as JSON on stdout.
fn run_check(resolved: &ResolvedConfig) -> ExitCode {
    match serde_json::to_string_pretty(resolved) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "failed to serialize configuration");
            ExitCode::FAILURE
        }
    }
}
