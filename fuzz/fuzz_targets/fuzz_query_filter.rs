//! Fuzz target: query admission filter.
//!
//! Anything admitted must be in bounds, free of forbidden bytes, and
//! rejected by the grammar oracle.

#![no_main]

use admit_query::denylist::{is_forbidden, MAX_QUERY_LEN, MIN_QUERY_LEN};
use admit_query::{QueryFilter, SqlGrammarValidator, Validator};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let filter = QueryFilter::new(SqlGrammarValidator::new());
    if filter.admit(text).is_ok() {
        assert!((MIN_QUERY_LEN..=MAX_QUERY_LEN).contains(&text.len()));
        assert!(!text.bytes().any(is_forbidden));
        assert!(!SqlGrammarValidator::new().parses(text));
    }
});
