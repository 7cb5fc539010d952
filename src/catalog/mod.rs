//! Catalog parsing into ordered [`BookRecord`] values.
//!
//! A catalog is UTF-8 text, one entry per line:
//!
//! ```text
//! # comment lines are ignored
//! ## Зарубежная фантастика
//! 1. Фрэнк Герберт - Дюна | Чтец: Иван Литвинов (2019)
//! 2. Айзек Азимов - Основание: Часть 1
//! Роджер Желязны - Хроники Амбера
//! ```
//!
//! `##` lines set the category for every entry below them. Numbered lines
//! carry their own id, which must fit in a `u32` (`0..=4294967295`); larger
//! numbers are reported as [`CatalogError::IdOutOfRange`]. Simple
//! `Author - Title` lines get an id derived from a hash of the line text, so
//! the same line keeps its id across runs.
//!
//! # Example
//!
//! ```
//! use audiobook_core::catalog::parse_catalog;
//!
//! let parsed = parse_catalog("1. Ivanov - Title1\n2. Petrov - Title2");
//! assert_eq!(parsed.records.len(), 2);
//! assert_eq!(parsed.records[1].id, 2);
//! ```

mod error;
mod record;

pub use error::CatalogError;
pub use record::BookRecord;

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{info, instrument, warn};

/// Prefix of a section (category) header line.
pub const SECTION_MARKER: &str = "##";

/// Prefix of a comment line.
pub const COMMENT_MARKER: &str = "#";

/// Hash-derived ids fall in `0..HASH_ID_MODULUS`.
pub const HASH_ID_MODULUS: u32 = 100_000;

/// `<int>. <author> - <title>[ | Narrator: <narrator> (<year>)]`
#[allow(clippy::expect_used)]
static NUMBERED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d+)\.\s+([^-]+?)\s*-\s*([^|]+?)(?:\s*\|\s*(?:Narrator|Чтец):\s*([^(]+?)\s*\((\d{4})\))?$",
    )
    .expect("numbered catalog regex is valid") // Static pattern, safe to panic
});

/// `<author> - <title>`
#[allow(clippy::expect_used)]
static SIMPLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^-]+?)\s*-\s*(.+)$").expect("simple catalog regex is valid") // Static pattern, safe to panic
});

/// Result of parsing one catalog.
#[derive(Debug, Default)]
pub struct CatalogParse {
    /// Parsed records in catalog order.
    pub records: Vec<BookRecord>,
    /// Per-line warnings (unparsable lines, duplicate ids).
    pub skipped: Vec<CatalogError>,
}

impl CatalogParse {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: u32) -> Option<&BookRecord> {
        self.records.iter().find(|record| record.id == id)
    }
}

/// Reads and parses a catalog file.
///
/// # Errors
///
/// Returns [`CatalogError::MalformedCatalog`] only when the file cannot be
/// read. Bad lines never fail the parse.
#[instrument(fields(path = %path.display()))]
pub fn parse_catalog_file(path: &Path) -> Result<CatalogParse, CatalogError> {
    let text = std::fs::read_to_string(path).map_err(|source| CatalogError::MalformedCatalog {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parse_catalog(&text))
}

/// Parses catalog text into records, skipping (and logging) lines that match
/// neither grammar.
#[instrument(skip(text), fields(text_len = text.len()))]
#[must_use]
pub fn parse_catalog(text: &str) -> CatalogParse {
    let mut result = CatalogParse::default();
    let mut current_category = String::new();
    let mut seen_ids: HashSet<u32> = HashSet::new();

    for (index, raw_line) in text.lines().enumerate() {
        let line_number = index + 1;
        let line = raw_line.trim();

        if line.is_empty() {
            continue;
        }

        // Section marker must be tested before the comment marker it starts with.
        if let Some(section) = line.strip_prefix(SECTION_MARKER) {
            current_category = section.trim_start_matches('#').trim().to_string();
            continue;
        }
        if line.starts_with(COMMENT_MARKER) {
            continue;
        }

        let record = match parse_book_line(line, line_number, &current_category) {
            Ok(record) => record,
            Err(warning) => {
                warn!(%warning, "skipping catalog line");
                result.skipped.push(warning);
                continue;
            }
        };

        if !seen_ids.insert(record.id) {
            let warning = CatalogError::DuplicateId {
                line_number,
                id: record.id,
                line: line.to_string(),
            };
            warn!(%warning, "skipping catalog line");
            result.skipped.push(warning);
            continue;
        }

        result.records.push(record);
    }

    info!(
        records = result.records.len(),
        skipped = result.skipped.len(),
        "catalog parsed"
    );
    result
}

/// Parses one trimmed book line, trying the numbered grammar first.
fn parse_book_line(
    line: &str,
    line_number: usize,
    category: &str,
) -> Result<BookRecord, CatalogError> {
    let unparsable = || CatalogError::unparsable(line_number, line);

    let (id, author, title_part, narrator, year) =
        if let Some(caps) = NUMBERED_PATTERN.captures(line) {
            let digits = caps.get(1).ok_or_else(unparsable)?.as_str();
            let id = digits
                .parse::<u32>()
                .map_err(|_| CatalogError::IdOutOfRange {
                    line_number,
                    id: digits.to_string(),
                    line: line.to_string(),
                })?;
            (
                id,
                caps.get(2).ok_or_else(unparsable)?.as_str(),
                caps.get(3).ok_or_else(unparsable)?.as_str(),
                caps.get(4).map(|m| m.as_str().trim().to_string()),
                caps.get(5).map(|m| m.as_str().to_string()),
            )
        } else {
            let caps = SIMPLE_PATTERN.captures(line).ok_or_else(unparsable)?;
            (
                hashed_line_id(line),
                caps.get(1).ok_or_else(unparsable)?.as_str(),
                caps.get(2).ok_or_else(unparsable)?.as_str(),
                None,
                None,
            )
        };

    let (title, subtitle) = split_title(title_part.trim());
    let author = author.trim();
    if author.is_empty() || title.is_empty() {
        return Err(unparsable());
    }

    Ok(BookRecord {
        id,
        author: author.to_string(),
        title,
        subtitle,
        narrator: narrator.filter(|n| !n.is_empty()),
        year,
        category: category.to_string(),
    })
}

/// Splits `Title: Subtitle` on the first colon.
fn split_title(title_part: &str) -> (String, Option<String>) {
    match title_part.split_once(':') {
        Some((title, subtitle)) => {
            let subtitle = subtitle.trim();
            (
                title.trim().to_string(),
                (!subtitle.is_empty()).then(|| subtitle.to_string()),
            )
        }
        None => (title_part.to_string(), None),
    }
}

/// Stable id for an un-numbered line: SHA-256 of the text, first four bytes
/// as a big-endian integer, reduced into `0..HASH_ID_MODULUS`.
#[must_use]
pub fn hashed_line_id(line: &str) -> u32 {
    let digest = Sha256::digest(line.as_bytes());
    let prefix = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    prefix % HASH_ID_MODULUS
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_line_full_form() {
        let parsed =
            parse_catalog("12. Фрэнк Герберт - Дюна | Чтец: Иван Литвинов (2019)");
        assert_eq!(parsed.len(), 1);
        let book = &parsed.records[0];
        assert_eq!(book.id, 12);
        assert_eq!(book.author, "Фрэнк Герберт");
        assert_eq!(book.title, "Дюна");
        assert_eq!(book.narrator.as_deref(), Some("Иван Литвинов"));
        assert_eq!(book.year.as_deref(), Some("2019"));
    }

    #[test]
    fn test_numbered_line_english_narrator_label() {
        let parsed = parse_catalog("3. Frank Herbert - Dune | Narrator: Scott Brick (2007)");
        let book = &parsed.records[0];
        assert_eq!(book.id, 3);
        assert_eq!(book.narrator.as_deref(), Some("Scott Brick"));
        assert_eq!(book.year.as_deref(), Some("2007"));
    }

    #[test]
    fn test_numbered_line_without_narrator() {
        let parsed = parse_catalog("1. Ivanov - Title1\n2. Petrov - Title2");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.records[0].id, 1);
        assert_eq!(parsed.records[0].author, "Ivanov");
        assert_eq!(parsed.records[0].title, "Title1");
        assert_eq!(parsed.records[1].id, 2);
        assert!(parsed.records.iter().all(|b| b.narrator.is_none()));
        assert!(parsed.records.iter().all(|b| b.year.is_none()));
        assert!(parsed.records.iter().all(|b| b.category.is_empty()));
    }

    #[test]
    fn test_subtitle_split_on_first_colon() {
        let parsed = parse_catalog("5. Азимов - Основание: Часть 1: Психоисторики");
        let book = &parsed.records[0];
        assert_eq!(book.title, "Основание");
        assert_eq!(book.subtitle.as_deref(), Some("Часть 1: Психоисторики"));
    }

    #[test]
    fn test_simple_line_gets_stable_hashed_id() {
        let line = "Роджер Желязны - Хроники Амбера";
        let first = parse_catalog(line);
        let second = parse_catalog(line);
        assert_eq!(first.records[0].id, second.records[0].id);
        assert_eq!(first.records[0].id, hashed_line_id(line));
        assert!(first.records[0].id < HASH_ID_MODULUS);
    }

    #[test]
    fn test_simple_line_id_independent_of_position() {
        let line = "Роджер Желязны - Хроники Амбера";
        let alone = parse_catalog(line);
        let shifted = parse_catalog(&format!("Some One - Other Book\n\n{line}"));
        assert_eq!(alone.records[0].id, shifted.records[1].id);
    }

    #[test]
    fn test_distinct_simple_lines_get_distinct_ids() {
        let parsed = parse_catalog("A Author - Book One\nA Author - Book Two");
        assert_eq!(parsed.len(), 2);
        assert_ne!(parsed.records[0].id, parsed.records[1].id);
    }

    #[test]
    fn test_sections_set_category_and_comments_skipped() {
        let input = "\
# my list
## Зарубежная фантастика
1. Герберт - Дюна
# a comment inside a section
## Русский детектив
2. Акунин - Азазель
";
        let parsed = parse_catalog(input);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.records[0].category, "Зарубежная фантастика");
        assert_eq!(parsed.records[1].category, "Русский детектив");
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_unparsable_lines_are_skipped_not_fatal() {
        let parsed = parse_catalog("just some words\n1. Ivanov - Title1\n---");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.skipped.len(), 2);
        assert!(matches!(
            parsed.skipped[0],
            CatalogError::LineUnparsable { line_number: 1, .. }
        ));
    }

    #[test]
    fn test_duplicate_numbered_id_keeps_first() {
        let parsed = parse_catalog("1. Ivanov - Title1\n1. Petrov - Title2");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.records[0].author, "Ivanov");
        assert!(matches!(
            parsed.skipped[0],
            CatalogError::DuplicateId { id: 1, .. }
        ));
    }

    #[test]
    fn test_numbered_id_range_limit() {
        let parsed = parse_catalog("4294967295. Ivanov - Last\n4294967296. Petrov - Overflow");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.records[0].id, u32::MAX);
        match &parsed.skipped[0] {
            CatalogError::IdOutOfRange { line_number, id, .. } => {
                assert_eq!(*line_number, 2);
                assert_eq!(id, "4294967296");
            }
            other => panic!("expected IdOutOfRange, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_catalog("   \n\n");
        assert!(parsed.is_empty());
        assert!(parsed.skipped.is_empty());
    }

    #[test]
    fn test_parse_catalog_file_missing_is_malformed() {
        let err = parse_catalog_file(Path::new("/definitely/not/here/books.txt")).unwrap_err();
        assert!(matches!(err, CatalogError::MalformedCatalog { .. }));
    }

    #[test]
    fn test_get_by_id() {
        let parsed = parse_catalog("1. Ivanov - Title1\n2. Petrov - Title2");
        assert_eq!(parsed.get(2).unwrap().author, "Petrov");
        assert!(parsed.get(3).is_none());
    }
}
