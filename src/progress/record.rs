//! The persisted completion entry.

use std::path::PathBuf;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Timestamp format used in the progress file.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One completed acquisition, keyed by record id in the store.
///
/// Field names on disk (`url`, `downloaded_at`) match progress files written
/// by earlier versions of the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub title: String,
    #[serde(rename = "url", default)]
    pub source_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub file_path: PathBuf,
    /// `None` for legacy entries that stored only a title.
    #[serde(rename = "downloaded_at", default, with = "timestamp")]
    pub completed_at: Option<NaiveDateTime>,
}

impl DownloadRecord {
    /// Creates a record stamped with the current local time.
    #[must_use]
    pub fn completed_now(
        title: impl Into<String>,
        source_url: impl Into<String>,
        category: impl Into<String>,
        file_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            category: category.into(),
            file_path: file_path.into(),
            completed_at: Some(chrono::Local::now().naive_local()),
        }
    }

    /// Entry recovered from the old title-only format.
    #[must_use]
    pub fn legacy(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: String::new(),
            category: String::new(),
            file_path: PathBuf::new(),
            completed_at: None,
        }
    }

    #[must_use]
    pub fn is_legacy(&self) -> bool {
        self.completed_at.is_none() && self.source_url.is_empty()
    }
}

/// On-disk value: a full record, or a bare title from the old format.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum StoredEntry {
    Full(DownloadRecord),
    Legacy(String),
}

impl From<StoredEntry> for DownloadRecord {
    fn from(entry: StoredEntry) -> Self {
        match entry {
            StoredEntry::Full(record) => record,
            StoredEntry::Legacy(title) => Self::legacy(title),
        }
    }
}

/// `Option<NaiveDateTime>` as `"%Y-%m-%d %H:%M:%S"`, with RFC 3339 accepted
/// on read.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    use super::TIMESTAMP_FORMAT;

    #[allow(clippy::ref_option)]
    pub fn serialize<S: Serializer>(
        value: &Option<NaiveDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(at) => serializer.serialize_str(&at.format(TIMESTAMP_FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<NaiveDateTime>, D::Error> {
        let Some(raw) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
            .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|dt| dt.naive_local()))
            .map(Some)
            .map_err(|e| D::Error::custom(format!("invalid timestamp '{raw}': {e}")))
    }
}
