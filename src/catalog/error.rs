//! Error types for catalog parsing.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or parsing a catalog.
///
/// Only [`CatalogError::MalformedCatalog`] is ever returned from
/// [`parse_catalog_file`](super::parse_catalog_file); the per-line variants are
/// collected in [`CatalogParse::skipped`](super::CatalogParse) as warnings.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog source could not be read at all.
    #[error("cannot read catalog {path}: {source}\n  Suggestion: check the catalog path and encoding (UTF-8)")]
    MalformedCatalog {
        /// Path that failed to read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// A non-empty line matched neither line grammar.
    #[error("line {line_number}: cannot parse '{line}'")]
    LineUnparsable {
        /// 1-based line number.
        line_number: usize,
        /// The trimmed line text.
        line: String,
    },

    /// A numbered line whose number does not fit a record id (`u32`).
    #[error("line {line_number}: id {id} is out of range (max 4294967295), skipping '{line}'")]
    IdOutOfRange {
        /// 1-based line number.
        line_number: usize,
        /// The number as written.
        id: String,
        /// The trimmed line text.
        line: String,
    },

    /// A line produced an id already used earlier in the same catalog.
    #[error("line {line_number}: id {id} already used by an earlier entry, skipping '{line}'")]
    DuplicateId {
        /// 1-based line number.
        line_number: usize,
        /// The clashing id.
        id: u32,
        /// The trimmed line text.
        line: String,
    },
}

impl CatalogError {
    /// Creates a `LineUnparsable` warning.
    #[must_use]
    pub fn unparsable(line_number: usize, line: &str) -> Self {
        Self::LineUnparsable {
            line_number,
            line: line.to_string(),
        }
    }

    /// Returns true for per-line warnings that never abort a parse.
    #[must_use]
    pub fn is_line_warning(&self) -> bool {
        !matches!(self, Self::MalformedCatalog { .. })
    }
}
