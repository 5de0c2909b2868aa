//! Fuzz target: commitment hashing.
//!
//! Arbitrary prefix/value splits must hash to 64 lowercase hex characters
//! and match `commit` over the concatenation.

#![no_main]

use admit_core::commit;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let split = text.char_indices().nth(text.chars().count() / 2).map_or(0, |(i, _)| i);
    let (prefix, value) = text.split_at(split);

    let hex = commit(prefix, value).to_string();
    assert_eq!(hex.len(), 64);
    assert!(hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    assert_eq!(hex, commit(text, "").to_string());
});
