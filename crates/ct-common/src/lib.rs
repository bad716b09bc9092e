//! Crash Triage common types and errors.
//!
//! This crate provides foundational types shared across the service:
//! - Thread and frame snapshots with walk bounds
//! - Target process state as seen by the debug backend
//! - Common error types with stable codes

pub mod error;
pub mod snapshot;

pub use error::{Error, ErrorCategory, Result};
pub use snapshot::{FrameSnapshot, ProcessState, ThreadSnapshot, MAX_FRAMES, MAX_THREADS};
