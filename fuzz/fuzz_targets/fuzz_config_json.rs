//! Fuzz target for configuration JSON parsing.
//!
//! Tests that configuration deserialization handles arbitrary input
//! without panicking.

#![no_main]

use ct_daemon::config::TriageConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Should never panic, only return an error
    let _ = serde_json::from_slice::<TriageConfig>(data);
});
