//! Configuration resolution for the triage daemon.
//!
//! The socket path and report directory are discovered in order:
//! CLI arguments → environment variables → the process manager's
//! defines file → built-in defaults. The defines file is a small JSON
//! document handed to the daemon by the hosting process manager at
//! startup; it is read once and never watched.

use ct_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable names.
const ENV_SOCKET: &str = "CT_SOCKET";
const ENV_REPORT_DIR: &str = "CT_REPORT_DIR";
const ENV_DEFINES: &str = "CT_DEFINES";

/// Built-in defaults.
pub const DEFAULT_SOCKET_PATH: &str = "ct-triage.sock";
pub const DEFAULT_REPORT_DIR: &str = ".";

/// Resolved daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    /// Unix socket the listener binds. Any stale file at this path is
    /// removed before binding.
    pub socket_path: PathBuf,
    /// Directory under which per-executable report directories are
    /// created.
    pub report_dir: PathBuf,
}

/// Where a configuration value came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Explicitly provided via CLI argument.
    CliArgument,
    /// Set via environment variable.
    Environment,
    /// Supplied by the process manager's defines file.
    DefinesFile,
    /// Using built-in defaults.
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::DefinesFile => write!(f, "defines file"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Resolved configuration plus provenance for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub config: TriageConfig,
    pub socket_source: ConfigSource,
    pub report_dir_source: ConfigSource,
    /// Defines file that was consulted, if any.
    pub defines_path: Option<PathBuf>,
}

/// Process-manager defines, as far as this daemon consumes them.
/// Unknown keys are the process manager's business and ignored here.
#[derive(Debug, Clone, Default, Deserialize)]
struct Defines {
    socket_path: Option<PathBuf>,
    report_dir: Option<PathBuf>,
}

/// CLI-provided configuration inputs.
#[derive(Debug, Clone, Default)]
pub struct ConfigOptions {
    pub socket: Option<PathBuf>,
    pub report_dir: Option<PathBuf>,
    pub defines: Option<PathBuf>,
}

/// Resolve the daemon configuration from CLI options, the process
/// environment, and the defines file.
pub fn resolve_config(options: &ConfigOptions) -> Result<ResolvedConfig> {
    resolve_with_env(options, &|name| std::env::var(name).ok())
}

/// Resolution with an injected environment lookup, for tests.
pub fn resolve_with_env(
    options: &ConfigOptions,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let defines_path = options
        .defines
        .clone()
        .or_else(|| env(ENV_DEFINES).map(PathBuf::from));
    let defines = match &defines_path {
        Some(path) => load_defines(path)?,
        None => Defines::default(),
    };

    let (socket_path, socket_source) = resolve_value(
        options.socket.clone(),
        env(ENV_SOCKET).map(PathBuf::from),
        defines.socket_path,
        PathBuf::from(DEFAULT_SOCKET_PATH),
    );
    let (report_dir, report_dir_source) = resolve_value(
        options.report_dir.clone(),
        env(ENV_REPORT_DIR).map(PathBuf::from),
        defines.report_dir,
        PathBuf::from(DEFAULT_REPORT_DIR),
    );

    Ok(ResolvedConfig {
        config: TriageConfig {
            socket_path,
            report_dir,
        },
        socket_source,
        report_dir_source,
        defines_path,
    })
}

fn resolve_value(
    cli: Option<PathBuf>,
    env: Option<PathBuf>,
    defines: Option<PathBuf>,
    default: PathBuf,
) -> (PathBuf, ConfigSource) {
    if let Some(value) = cli {
        return (value, ConfigSource::CliArgument);
    }
    if let Some(value) = env {
        return (value, ConfigSource::Environment);
    }
    if let Some(value) = defines {
        return (value, ConfigSource::DefinesFile);
    }
    (default, ConfigSource::BuiltinDefault)
}

fn load_defines(path: &Path) -> Result<Defines> {
    let text = fs::read_to_string(path).map_err(|err| {
        Error::InvalidDefines(format!("cannot read {}: {err}", path.display()))
    })?;
    serde_json::from_str(&text)
        .map_err(|err| Error::InvalidDefines(format!("{}: {err}", path.display())))
}
