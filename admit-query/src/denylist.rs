//! Byte-level denylist, the first admission layer.
//!
//! What survives is letters, digits, space, a handful of punctuation
//! (`+ - . 0x7f`) and non-ASCII bytes other than `0xa0`.

/// Shortest admissible query, in bytes.
pub const MIN_QUERY_LEN: usize = 3;

/// Longest admissible query, in bytes.
pub const MAX_QUERY_LEN: usize = 128;

/// Every forbidden byte.
pub const FORBIDDEN: &[u8] =
    b"\x00\t\n\x0b\x0c\r`~!@#$%^&*()_=[]{}\\|:;'\"/?<>,\xa0";

const TABLE: [bool; 256] = {
    let mut table = [false; 256];
    let mut i = 0;
    while i < FORBIDDEN.len() {
        table[FORBIDDEN[i] as usize] = true;
        i += 1;
    }
    table
};

/// `true` if `byte` may never appear in a query.
#[must_use]
pub const fn is_forbidden(byte: u8) -> bool {
    TABLE[byte as usize]
}

/// First layer verdict on raw bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Length and bytes are acceptable.
    Clean,
    /// Length outside `MIN_QUERY_LEN..=MAX_QUERY_LEN`.
    BadLength(usize),
    /// A forbidden byte at this offset.
    ForbiddenByte { offset: usize, byte: u8 },
}

/// Screen `payload` for length and forbidden bytes.
#[must_use]
pub fn screen(payload: &[u8]) -> Screen {
    if !(MIN_QUERY_LEN..=MAX_QUERY_LEN).contains(&payload.len()) {
        return Screen::BadLength(payload.len());
    }
    match payload.iter().position(|&b| is_forbidden(b)) {
        Some(offset) => Screen::ForbiddenByte {
            offset,
            byte: payload[offset],
        },
        None => Screen::Clean,
    }
}
