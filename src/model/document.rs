//! Document-level metadata.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    pub title: Option<String>,

    /// Document author
    pub author: Option<String>,

    /// Document subject
    pub subject: Option<String>,

    /// Keywords, split on commas
    pub keywords: Vec<String>,

    /// Creator application
    pub creator: Option<String>,

    /// PDF producer
    pub producer: Option<String>,

    /// Creation date
    pub created: Option<DateTime<Utc>>,

    /// Last modification date
    pub modified: Option<DateTime<Utc>>,

    /// PDF version (e.g., "1.7")
    pub pdf_version: String,

    /// Total number of pages
    pub page_count: u32,

    /// Size of the PDF byte stream
    pub file_size: u64,

    /// Whether the document is encrypted
    pub encrypted: bool,
}

impl Metadata {
    /// Create new metadata with PDF version.
    pub fn with_version(version: impl Into<String>) -> Self {
        Self {
            pdf_version: version.into(),
            ..Default::default()
        }
    }

    /// Set keywords from a raw comma-separated keyword string.
    pub fn set_keywords(&mut self, raw: &str) {
        self.keywords = raw
            .split(',')
            .map(collapse_whitespace)
            .filter(|k| !k.is_empty())
            .collect();
    }

    /// Human-readable file size, e.g. `"1.50 MB (1536 KB)"`.
    pub fn file_size_display(&self) -> String {
        let kb = self.file_size as f64 / 1024.0;
        let mb = kb / 1024.0;
        format!("{:.2} MB ({:.0} KB)", mb, kb)
    }
}

/// Collapse runs of whitespace into single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
