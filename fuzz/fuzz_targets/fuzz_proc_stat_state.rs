//! Fuzz target for /proc/[pid]/stat state parsing.
//!
//! Tests that the state field extractor handles arbitrary input
//! without panicking.

#![no_main]

use ct_backend::procfs::{parse_stat_state, state_from_char};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Some(c) = parse_stat_state(data) {
        let _ = state_from_char(c);
    }
});
