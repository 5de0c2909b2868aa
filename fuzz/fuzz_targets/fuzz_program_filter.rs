//! Fuzz target: Go program filter.
//!
//! The tree-sitter parse must never panic, verdicts are deterministic, and
//! anything over the size ceiling is refused as too large.

#![no_main]

use admit_sandbox::{ProgramFilter, Rejection, MAX_PROGRAM_BYTES};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let first = ProgramFilter::new().check(data).ok();
    let second = ProgramFilter::new().check(data).ok();
    assert_eq!(first, second, "verdict must not depend on parser state");

    if data.len() > MAX_PROGRAM_BYTES {
        assert_eq!(first, Some(Err(Rejection::TooLarge)));
    }
});
