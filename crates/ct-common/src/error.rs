//! Error types for the crash triage service.
//!
//! This module provides structured error handling with:
//! - Stable error codes for machine parsing
//! - Category classification for error grouping
//! - Recoverability hints for the session boundary
//!
//! Every session-level failure is mapped at the session boundary to
//! "log, close without acknowledgement"; codes and categories exist so
//! logs stay greppable across refactors.

use crate::snapshot::ProcessState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for crash triage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and defines-file errors.
    Config,
    /// Peer credential and identity-check errors.
    Auth,
    /// Wire protocol errors (short or absent reads).
    Protocol,
    /// Debug backend errors (target, attach, state, detach).
    Backend,
    /// Target identity resolution errors (/proc lookups).
    Identity,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Auth => write!(f, "auth"),
            ErrorCategory::Protocol => write!(f, "protocol"),
            ErrorCategory::Backend => write!(f, "backend"),
            ErrorCategory::Identity => write!(f, "identity"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for the crash triage service.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid defines file: {0}")]
    InvalidDefines(String),

    // Authentication errors (20-29)
    #[error("peer credential query failed: {0}")]
    CredentialQuery(String),

    #[error("claimed pid {claimed} does not match socket peer pid {peer}")]
    PidMismatch { claimed: u32, peer: u32 },

    // Protocol errors (30-39)
    #[error("short read: wanted {wanted} bytes, got {got}")]
    ShortRead { wanted: usize, got: usize },

    // Backend errors (40-49)
    #[error("failed to create debug target: {0}")]
    CreateTarget(String),

    #[error("failed to attach to pid {pid}: {reason}")]
    Attach { pid: u32, reason: String },

    #[error("process {pid} is not stopped (state: {state})")]
    NotStopped { pid: u32, state: ProcessState },

    #[error("failed to detach from pid {pid}: {reason}")]
    Detach { pid: u32, reason: String },

    #[error("failed to resume pid {pid}: {reason}")]
    Resume { pid: u32, reason: String },

    // Identity errors (50-59)
    #[error("failed to resolve executable for pid {pid}: {reason}")]
    ExeResolve { pid: u32, reason: String },

    // I/O errors (60-69)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Returns the error code for this error type.
    ///
    /// Error codes are stable and grouped by category:
    /// - 10-19: Configuration errors
    /// - 20-29: Authentication errors
    /// - 30-39: Protocol errors
    /// - 40-49: Backend errors
    /// - 50-59: Identity errors
    /// - 60-69: I/O errors
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidDefines(_) => 11,
            Error::CredentialQuery(_) => 20,
            Error::PidMismatch { .. } => 21,
            Error::ShortRead { .. } => 30,
            Error::CreateTarget(_) => 40,
            Error::Attach { .. } => 41,
            Error::NotStopped { .. } => 42,
            Error::Detach { .. } => 43,
            Error::Resume { .. } => 44,
            Error::ExeResolve { .. } => 50,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Returns the error category for grouping and filtering.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidDefines(_) => ErrorCategory::Config,

            Error::CredentialQuery(_) | Error::PidMismatch { .. } => ErrorCategory::Auth,

            Error::ShortRead { .. } => ErrorCategory::Protocol,

            Error::CreateTarget(_)
            | Error::Attach { .. }
            | Error::NotStopped { .. }
            | Error::Detach { .. }
            | Error::Resume { .. } => ErrorCategory::Backend,

            Error::ExeResolve { .. } => ErrorCategory::Identity,

            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable.
    ///
    /// "Recoverable" here means the service keeps accepting sessions
    /// and the reporter may usefully retry. None of these errors is
    /// service-fatal; the hint exists for log triage only.
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Config errors: recoverable by fixing the defines/flags
            Error::Config(_) => true,
            Error::InvalidDefines(_) => true,

            // Auth: a mismatch is intentional rejection, not transient
            Error::CredentialQuery(_) => true,
            Error::PidMismatch { .. } => false,

            // Protocol: the reporter may resend a full notification
            Error::ShortRead { .. } => true,

            // Backend: attach may succeed on retry; a gone process won't
            Error::CreateTarget(_) => true,
            Error::Attach { .. } => true,
            Error::NotStopped { .. } => false, // Target kept running
            Error::Detach { .. } => false,
            Error::Resume { .. } => false,

            // Identity: the process exited before we could look
            Error::ExeResolve { .. } => false,

            // I/O: often transient
            Error::Io(_) => true,
            Error::Json(_) => true,
        }
    }

    /// True when the session should close without telling the peer
    /// anything about why.
    pub fn is_silent_drop(&self) -> bool {
        matches!(self, Error::PidMismatch { .. } | Error::ShortRead { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(Error::Config("test".into()).code(), 10);
        assert_eq!(
            Error::PidMismatch {
                claimed: 1,
                peer: 2
            }
            .code(),
            21
        );
        assert_eq!(Error::ShortRead { wanted: 4, got: 0 }.code(), 30);
        assert_eq!(
            Error::NotStopped {
                pid: 1,
                state: ProcessState::Running
            }
            .code(),
            42
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(
            Error::CredentialQuery("no ucred".into()).category(),
            ErrorCategory::Auth
        );
        assert_eq!(
            Error::Attach {
                pid: 9,
                reason: "ESRCH".into()
            }
            .category(),
            ErrorCategory::Backend
        );
        assert_eq!(
            Error::ExeResolve {
                pid: 9,
                reason: "gone".into()
            }
            .category(),
            ErrorCategory::Identity
        );
    }

    #[test]
    fn test_error_recoverable() {
        assert!(Error::Config("test".into()).is_recoverable());
        assert!(!Error::PidMismatch {
            claimed: 1234,
            peer: 9999
        }
        .is_recoverable());
        assert!(Error::Attach {
            pid: 1,
            reason: "EPERM".into()
        }
        .is_recoverable());
        assert!(!Error::NotStopped {
            pid: 1,
            state: ProcessState::Running
        }
        .is_recoverable());
    }

    #[test]
    fn test_silent_drop() {
        assert!(Error::PidMismatch {
            claimed: 1,
            peer: 2
        }
        .is_silent_drop());
        assert!(Error::ShortRead { wanted: 1, got: 0 }.is_silent_drop());
        assert!(!Error::Attach {
            pid: 1,
            reason: "x".into()
        }
        .is_silent_drop());
    }

    #[test]
    fn test_display_messages() {
        let err = Error::PidMismatch {
            claimed: 1234,
            peer: 9999,
        };
        assert_eq!(
            err.to_string(),
            "claimed pid 1234 does not match socket peer pid 9999"
        );

        let err = Error::NotStopped {
            pid: 77,
            state: ProcessState::Running,
        };
        assert_eq!(err.to_string(), "process 77 is not stopped (state: running)");
    }

    #[test]
    fn test_error_category_display() {
        assert_eq!(ErrorCategory::Auth.to_string(), "auth");
        assert_eq!(ErrorCategory::Backend.to_string(), "backend");
    }
}
