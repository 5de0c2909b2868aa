//! Query Admission Filter: byte screen first, grammar oracle second.

use crate::denylist::{self, Screen};
use crate::validator::Validator;

/// Why a query was refused. Callers see a single "Not allowed" for all of
/// these; the detail is for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Rejection {
    /// Length outside the admissible range.
    #[error("length {0} outside the admissible range")]
    Length(usize),

    /// A forbidden byte was found.
    #[error("forbidden byte {byte:#04x} at offset {offset}")]
    ForbiddenByte { offset: usize, byte: u8 },

    /// The text parses under the grammar oracle.
    #[error("query is well-formed")]
    WellFormed,
}

/// Two-layer filter. Admits only text that passes the denylist *and* fails
/// to parse.
#[derive(Debug, Clone)]
pub struct QueryFilter<V> {
    validator: V,
}

impl<V: Validator> QueryFilter<V> {
    /// Create a filter around the given grammar oracle.
    pub fn new(validator: V) -> Self {
        Self { validator }
    }

    /// Decide whether `text` may be forwarded.
    ///
    /// The grammar oracle is consulted only for text that clears the byte
    /// screen.
    ///
    /// # Errors
    /// Returns the first layer that refused the text.
    pub fn admit(&self, text: &str) -> Result<(), Rejection> {
        match denylist::screen(text.as_bytes()) {
            Screen::BadLength(len) => return Err(Rejection::Length(len)),
            Screen::ForbiddenByte { offset, byte } => {
                return Err(Rejection::ForbiddenByte { offset, byte });
            }
            Screen::Clean => {}
        }
        if self.validator.parses(text) {
            return Err(Rejection::WellFormed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::validator::SqlGrammarValidator;

    struct Fixed(bool);

    impl Validator for Fixed {
        fn parses(&self, _candidate: &str) -> bool {
            self.0
        }
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl Validator for Counting {
        fn parses(&self, _candidate: &str) -> bool {
            self.0.fetch_add(1, Ordering::SeqCst);
            false
        }
    }

    #[test]
    fn tautology_is_rejected_as_well_formed() {
        let filter = QueryFilter::new(SqlGrammarValidator::new());
        assert_eq!(filter.admit("1 OR 1"), Err(Rejection::WellFormed));
    }

    #[test]
    fn non_parsing_text_is_admitted() {
        let filter = QueryFilter::new(SqlGrammarValidator::new());
        assert_eq!(filter.admit("xyz123"), Ok(()));
    }

    #[test]
    fn semicolon_is_rejected_before_grammar() {
        let filter = QueryFilter::new(Counting::default());
        assert_eq!(
            filter.admit("1;1"),
            Err(Rejection::ForbiddenByte {
                offset: 1,
                byte: b';',
            })
        );
        assert_eq!(filter.validator.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn short_and_long_text_is_rejected_before_grammar() {
        let filter = QueryFilter::new(Counting::default());
        assert_eq!(filter.admit("ab"), Err(Rejection::Length(2)));
        assert_eq!(filter.admit(&"a".repeat(129)), Err(Rejection::Length(129)));
        assert_eq!(filter.validator.0.load(Ordering::SeqCst), 0);
        assert_eq!(filter.admit("abc"), Ok(()));
        assert_eq!(filter.validator.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn oracle_verdict_is_inverted() {
        assert_eq!(QueryFilter::new(Fixed(true)).admit("abc"), Err(Rejection::WellFormed));
        assert_eq!(QueryFilter::new(Fixed(false)).admit("abc"), Ok(()));
    }

    #[test]
    fn length_is_measured_in_bytes() {
        // 43 two-byte characters: 86 bytes is fine, 65 of them (130 bytes) is not.
        let filter = QueryFilter::new(Fixed(false));
        assert_eq!(filter.admit(&"\u{e9}".repeat(43)), Ok(()));
        assert_eq!(filter.admit(&"\u{e9}".repeat(65)), Err(Rejection::Length(130)));
    }

    proptest::proptest! {
        #[test]
        fn proptest_admitted_text_is_always_clean_and_in_bounds(text in "\\PC{0,140}") {
            let filter = QueryFilter::new(SqlGrammarValidator::new());
            if filter.admit(&text).is_ok() {
                proptest::prop_assert_eq!(denylist::screen(text.as_bytes()), Screen::Clean);
                proptest::prop_assert!(!SqlGrammarValidator::new().parses(&text));
            }
        }
    }
}
