//! Extraction result with metadata and statistics.

use serde::Serialize;

use super::{ImageRecord, Metadata, TableRecord};
use crate::error::{Error, Result};

/// Result of a successful extraction run.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult {
    /// Whole-document text, pages in order
    pub text: String,

    /// Name of the text backend that produced `text`
    pub text_backend: String,

    /// Pages that contributed no text in the winning backend
    pub pages_without_text: Vec<u32>,

    /// Validated tables ordered by page, then index
    pub tables: Vec<TableRecord>,

    /// Deduplicated images ordered by page
    pub images: Vec<ImageRecord>,

    /// Document metadata
    pub metadata: Metadata,

    /// Extraction statistics
    pub stats: ExtractionStats,
}

impl ExtractionResult {
    /// Serialize the result to JSON.
    pub fn to_json(&self, format: JsonFormat) -> Result<String> {
        let result = match format {
            JsonFormat::Pretty => serde_json::to_string_pretty(self),
            JsonFormat::Compact => serde_json::to_string(self),
        };

        result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
    }

    /// Tables found on the given page.
    pub fn tables_on_page(&self, page: u32) -> impl Iterator<Item = &TableRecord> {
        self.tables.iter().filter(move |t| t.page_number == page)
    }
}

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Statistics collected during an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionStats {
    /// Total number of pages in the document
    pub page_count: u32,

    /// Distinct table candidates across all pages
    pub table_candidates: u32,

    /// Candidates accepted as tables
    pub tables_accepted: u32,

    /// Candidates rejected by validation or cleaning
    pub tables_rejected: u32,

    /// Pages where the OCR table fallback ran
    pub ocr_fallback_pages: u32,

    /// Pages rasterized for image harvesting
    pub images_rasterized: u32,

    /// Page images rejected by the dimension filter
    pub images_rejected: u32,

    /// Page images dropped as duplicates
    pub duplicate_images: u32,

    /// Page-level failures in the table and image stages
    pub failed_pages: u32,

    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
}

impl ExtractionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge another stats instance into this one.
    pub fn merge(&mut self, other: &ExtractionStats) {
        self.table_candidates += other.table_candidates;
        self.tables_accepted += other.tables_accepted;
        self.tables_rejected += other.tables_rejected;
        self.ocr_fallback_pages += other.ocr_fallback_pages;
        self.images_rasterized += other.images_rasterized;
        self.images_rejected += other.images_rejected;
        self.duplicate_images += other.duplicate_images;
        self.failed_pages += other.failed_pages;
    }
}
