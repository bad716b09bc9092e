//! Fuzz target for crash notification parsing.
//!
//! Tests that the wire parser handles arbitrary input without panicking.

#![no_main]

use ct_daemon::wire::{parse_notification, read_claimed_pid, read_trigger};
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Both the buffer and the streaming paths should only ever error
    let _ = parse_notification(data);

    let mut cursor = Cursor::new(data);
    if read_claimed_pid(&mut cursor).is_ok() {
        let _ = read_trigger(&mut cursor);
    }
});
