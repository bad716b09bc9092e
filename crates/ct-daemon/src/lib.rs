//! Crash Triage daemon library.
//!
//! This library provides the service side of out-of-process crash
//! triage:
//! - Wire protocol for crash notifications
//! - Kernel-verified peer authentication
//! - Per-connection session protocol (read, authenticate, attach,
//!   walk, report, acknowledge)
//! - Socket listener with thread-per-connection dispatch
//! - Configuration resolution and logging setup
//!
//! The binary entry point is in `main.rs`.

pub mod auth;
pub mod config;
pub mod listener;
pub mod logging;
pub mod session;
pub mod wire;
