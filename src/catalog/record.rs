//! The parsed catalog entry and its derived views.

use std::fmt;

use serde::Serialize;

/// Maximum length of [`BookRecord::slug`].
const MAX_SLUG_CHARS: usize = 100;

/// One book from the catalog. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookRecord {
    /// Stable id: explicit for numbered lines, content-hash derived otherwise.
    pub id: u32,
    pub author: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub narrator: Option<String>,
    /// Four-digit recording year, when given.
    pub year: Option<String>,
    /// Most recent section header above the entry; empty when none.
    pub category: String,
}

impl BookRecord {
    /// `author - title[: subtitle]`
    #[must_use]
    pub fn full_title(&self) -> String {
        match &self.subtitle {
            Some(subtitle) => format!("{} - {}: {}", self.author, self.title, subtitle),
            None => format!("{} - {}", self.author, self.title),
        }
    }

    /// Plain query used by the simplest search strategy.
    #[must_use]
    pub fn search_query(&self, keyword: &str) -> String {
        format!("{} {} {}", self.author, self.title, keyword)
            .trim()
            .to_string()
    }

    /// Filesystem-safe single-segment name derived from [`full_title`](Self::full_title).
    ///
    /// Keeps word characters, whitespace, `-` and `.`, then folds runs of
    /// whitespace and hyphens into one `-`.
    #[must_use]
    pub fn slug(&self) -> String {
        let mut out = String::new();
        let mut prev_sep = false;
        for ch in self.full_title().chars() {
            if ch.is_whitespace() || ch == '-' {
                if !prev_sep {
                    out.push('-');
                    prev_sep = true;
                }
            } else if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                out.push(ch);
                prev_sep = false;
            }
        }
        out.trim_matches('-').chars().take(MAX_SLUG_CHARS).collect()
    }

    pub fn narrator(&self) -> Option<&str> {
        self.narrator.as_deref()
    }

    pub fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_deref()
    }
}

impl fmt::Display for BookRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.id, self.full_title())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(subtitle: Option<&str>) -> BookRecord {
        BookRecord {
            id: 7,
            author: "Сергей Лукьяненко".to_string(),
            title: "Ночной Дозор".to_string(),
            subtitle: subtitle.map(ToString::to_string),
            narrator: None,
            year: None,
            category: String::new(),
        }
    }

    #[test]
    fn test_full_title_without_subtitle() {
        assert_eq!(record(None).full_title(), "Сергей Лукьяненко - Ночной Дозор");
    }

    #[test]
    fn test_full_title_with_subtitle() {
        assert_eq!(
            record(Some("Часть 1")).full_title(),
            "Сергей Лукьяненко - Ночной Дозор: Часть 1"
        );
    }

    #[test]
    fn test_search_query_appends_keyword() {
        assert_eq!(
            record(None).search_query("аудиокнига"),
            "Сергей Лукьяненко Ночной Дозор аудиокнига"
        );
    }

    #[test]
    fn test_slug_is_single_segment() {
        let slug = record(Some("Part: 1/2")).slug();
        assert_eq!(slug, "Сергей-Лукьяненко-Ночной-Дозор-Part-12");
        assert!(!slug.contains('/'));
        assert!(!slug.contains(':'));
    }

    #[test]
    fn test_slug_truncated() {
        let mut long = record(None);
        long.title = "x".repeat(300);
        assert_eq!(long.slug().chars().count(), 100);
    }

    #[test]
    fn test_display_includes_id() {
        assert_eq!(record(None).to_string(), "#7 Сергей Лукьяненко - Ночной Дозор");
    }
}
