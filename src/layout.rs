//! Deterministic placement of acquired books on disk.
//!
//! The layout is `<root>/<bucket>/<Author>[/<Series>]/<file stem>.<ext>`:
//!
//! - **bucket** comes from the record's category text. A region marker
//!   (foreign or domestic) and a genre marker (fantasy or detective) must
//!   both appear; the first matching pair wins. Anything else lands in the
//!   default bucket.
//! - **Author** is transliterated to Latin, stripped of non-word characters,
//!   with whitespace collapsed to `_`.
//! - **Series** is the title's leading non-digit prefix, used only when the
//!   title contains a digit and the sanitized prefix is long enough.
//!
//! Every function here is pure; directories are created by the orchestrator.

use std::path::{Path, PathBuf};

use crate::catalog::BookRecord;
use crate::config::LayoutConfig;

/// Directory name used when an author sanitizes to nothing.
const UNKNOWN_AUTHOR_DIR: &str = "unknown_author";

/// Separator between filename segments.
const SEGMENT_SEPARATOR: &str = " - ";

/// Cyrillic to Latin mapping for author directories.
const CYRILLIC_TO_LATIN: &[(char, &str)] = &[
    ('а', "a"),
    ('б', "b"),
    ('в', "v"),
    ('г', "g"),
    ('д', "d"),
    ('е', "e"),
    ('ё', "yo"),
    ('ж', "zh"),
    ('з', "z"),
    ('и', "i"),
    ('й', "y"),
    ('к', "k"),
    ('л', "l"),
    ('м', "m"),
    ('н', "n"),
    ('о', "o"),
    ('п', "p"),
    ('р', "r"),
    ('с', "s"),
    ('т', "t"),
    ('у', "u"),
    ('ф', "f"),
    ('х', "h"),
    ('ц', "ts"),
    ('ч', "ch"),
    ('ш', "sh"),
    ('щ', "sch"),
    ('ъ', ""),
    ('ы', "y"),
    ('ь', ""),
    ('э', "e"),
    ('ю', "yu"),
    ('я', "ya"),
];

/// Maps records to destination directories and file stems.
#[derive(Debug, Clone)]
pub struct OutputLayoutPolicy {
    root: PathBuf,
    config: LayoutConfig,
}

impl OutputLayoutPolicy {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: LayoutConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Destination directory for `record`.
    #[must_use]
    pub fn placement_path_for(&self, record: &BookRecord) -> PathBuf {
        let author_dir = self
            .root
            .join(self.bucket_for(&record.category))
            .join(author_dir_name(&record.author));

        match series_dir_name(&record.title, self.config.min_series_name_chars) {
            Some(series) => author_dir.join(series),
            None => author_dir,
        }
    }

    /// Bucket for a category text; the default bucket when nothing matches.
    #[must_use]
    pub fn bucket_for(&self, category: &str) -> String {
        let category = category.to_lowercase();
        let has_any = |markers: &[String]| {
            markers
                .iter()
                .any(|marker| !marker.is_empty() && category.contains(&marker.to_lowercase()))
        };

        let foreign = has_any(&self.config.foreign_markers);
        let domestic = has_any(&self.config.domestic_markers);
        let fantasy = has_any(&self.config.fantasy_markers);
        let detective = has_any(&self.config.detective_markers);

        let bucket = match (foreign, domestic, fantasy, detective) {
            (true, _, true, _) => "foreign_fantasy",
            (true, _, _, true) => "foreign_detective",
            (_, true, true, _) => "russian_fantasy",
            (_, true, _, true) => "russian_detective",
            _ => return self.config.default_bucket.clone(),
        };
        bucket.to_string()
    }

    /// File name without extension:
    /// `Author - Title[_Subtitle] - (Narrator, Year)`.
    ///
    /// Segments are sanitized independently, repeated separators collapsed,
    /// and the result cut to the configured maximum length.
    #[must_use]
    pub fn file_stem_for(&self, record: &BookRecord) -> String {
        let mut segments = Vec::with_capacity(3);

        segments.push(non_empty_or(
            sanitize_word_segment(&record.author),
            UNKNOWN_AUTHOR_DIR,
        ));

        let mut title = sanitize_word_segment(&record.title);
        if let Some(subtitle) = record.subtitle() {
            let subtitle = sanitize_word_segment(subtitle);
            if !subtitle.is_empty() {
                title = format!("{title}_{subtitle}");
            }
        }
        segments.push(non_empty_or(title, &format!("book_{}", record.id)));

        let extras: Vec<String> = record
            .narrator()
            .map(sanitize_narrator)
            .into_iter()
            .chain(record.year.clone())
            .filter(|part| !part.is_empty())
            .collect();
        if !extras.is_empty() {
            segments.push(format!("({})", extras.join(", ")));
        }

        let joined = collapse_repeated_separators(&segments.join(SEGMENT_SEPARATOR));
        let truncated: String = joined.chars().take(self.config.max_filename_chars).collect();
        truncated
            .trim_end_matches([' ', '-', '_', ','])
            .to_string()
    }
}

/// Transliterates Cyrillic letters; other characters pass through.
#[must_use]
pub fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        match CYRILLIC_TO_LATIN.iter().find(|(cyr, _)| *cyr == lower) {
            Some((_, latin)) if ch.is_uppercase() => {
                let mut letters = latin.chars();
                if let Some(first) = letters.next() {
                    out.extend(first.to_uppercase());
                    out.push_str(letters.as_str());
                }
            }
            Some((_, latin)) => out.push_str(latin),
            None => out.push(ch),
        }
    }
    out
}

/// Author directory name: transliterated, word characters only, `_` for
/// whitespace runs.
#[must_use]
pub fn author_dir_name(author: &str) -> String {
    non_empty_or(
        sanitize_word_segment(&transliterate(author)),
        UNKNOWN_AUTHOR_DIR,
    )
}

/// Series directory name, if the title looks like part of a series.
#[must_use]
pub fn series_dir_name(title: &str, min_chars: usize) -> Option<String> {
    if !title.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    let prefix: String = title.chars().take_while(|c| !c.is_ascii_digit()).collect();
    let series = sanitize_word_segment(&prefix);
    (series.chars().count() > min_chars).then_some(series)
}

/// Keeps word characters, turns whitespace runs into one `_`, drops the rest.
fn sanitize_word_segment(value: &str) -> String {
    let mut out = String::new();
    let mut pending_sep = false;
    for ch in value.trim().chars() {
        if ch.is_whitespace() || ch == '_' {
            pending_sep = !out.is_empty();
        } else if ch.is_alphanumeric() {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(ch);
        }
    }
    out
}

/// Narrator names keep their spaces and hyphens.
fn sanitize_narrator(value: &str) -> String {
    let kept: String = value
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || matches!(c, '-' | '_'))
        .collect();
    kept.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses runs of the same separator character (`_`, `-`, space).
fn collapse_repeated_separators(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous: Option<char> = None;
    for ch in value.chars() {
        let is_sep = matches!(ch, '_' | '-' | ' ');
        if is_sep && previous == Some(ch) {
            continue;
        }
        out.push(ch);
        previous = Some(ch);
    }
    out
}

fn non_empty_or(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}
