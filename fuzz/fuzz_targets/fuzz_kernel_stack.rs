//! Fuzz target for /proc/[pid]/task/[tid]/stack parsing.
//!
//! Tests that the kernel stack line splitter handles arbitrary input
//! without panicking.

#![no_main]

use ct_backend::procfs::parse_kernel_stack;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let _ = parse_kernel_stack(data);
});
