//! Static admission checks for submitted Go programs.
//!
//! A program is admitted only if it parses cleanly and declares no imports.
//! Without imports a Go program cannot reach `os`, `net`, `syscall` or
//! `unsafe`, which leaves pure computation plus the builtins.

use std::fmt;

use tree_sitter::{Language, Parser};

use crate::config::MAX_PROGRAM_BYTES;
use crate::SandboxError;

/// Why a program was refused before building.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Rejection {
    /// Larger than [`MAX_PROGRAM_BYTES`].
    TooLarge,
    /// Not valid Go. Parser detail is not reported.
    Syntax,
    /// At least one import declaration is present.
    Imports,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge => f.write_str("file is too large (>10KB)"),
            Self::Syntax => f.write_str("Syntax error"),
            Self::Imports => f.write_str("Imports are not allowed"),
        }
    }
}

/// Grammar-aware filter over Go source.
pub struct ProgramFilter {
    language: Language,
}

impl fmt::Debug for ProgramFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgramFilter").finish_non_exhaustive()
    }
}

impl ProgramFilter {
    /// Create a filter for the Go grammar.
    #[must_use]
    pub fn new() -> Self {
        Self {
            language: tree_sitter_go::LANGUAGE.into(),
        }
    }

    /// Check `source`: size, then syntax, then imports.
    ///
    /// # Errors
    /// `Ok(Err(_))` carries the rejection; the outer error is only returned if
    /// the grammar cannot be loaded.
    pub fn check(&self, source: &[u8]) -> Result<Result<(), Rejection>, SandboxError> {
        if source.len() > MAX_PROGRAM_BYTES {
            return Ok(Err(Rejection::TooLarge));
        }
        let Ok(text) = std::str::from_utf8(source) else {
            return Ok(Err(Rejection::Syntax));
        };

        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| SandboxError::Grammar(e.to_string()))?;
        let Some(tree) = parser.parse(text, None) else {
            return Ok(Err(Rejection::Syntax));
        };

        let root = tree.root_node();
        if root.has_error() {
            return Ok(Err(Rejection::Syntax));
        }

        let mut cursor = root.walk();
        let mut seen_package = false;
        for node in root.named_children(&mut cursor) {
            match node.kind() {
                "comment" => {}
                "package_clause" if !seen_package => seen_package = true,
                "import_declaration" => return Ok(Err(Rejection::Imports)),
                _ if !seen_package => return Ok(Err(Rejection::Syntax)),
                _ => {}
            }
        }
        if !seen_package {
            return Ok(Err(Rejection::Syntax));
        }
        Ok(Ok(()))
    }
}

impl Default for ProgramFilter {
    fn default() -> Self {
        Self::new()
    }
}
