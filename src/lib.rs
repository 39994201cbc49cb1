//! # pdfharvest
//!
//! Multi-strategy content extraction from PDF documents.
//!
//! A run pulls three kinds of content out of a document:
//!
//! - **Text** through an ordered chain of backends: the embedded text
//!   layer first, then an alternate parser, then page OCR.
//! - **Tables** from several geometric strategies, falling back to OCR on
//!   pages where no structure is found. Candidates are validated, cleaned
//!   and typed.
//! - **Page images**, rasterized, enhanced, deduplicated by content hash
//!   and classified by aspect ratio.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfharvest::{extract_file, JsonFormat};
//!
//! fn main() -> pdfharvest::Result<()> {
//!     let result = extract_file("report.pdf")?;
//!
//!     println!("Text from '{}' backend", result.text_backend);
//!     for table in &result.tables {
//!         println!("Page {}: {}", table.page_number, table.description);
//!     }
//!
//!     std::fs::write("report.json", result.to_json(JsonFormat::Pretty)?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## External tools
//!
//! The default OCR engine and rasterizer shell out to `tesseract` and
//! `pdftoppm`. Both are traits ([`OcrEngine`], [`Rasterizer`]) and can be
//! replaced through [`ExtractionOrchestrator::with_ocr`] and
//! [`ExtractionOrchestrator::with_rasterizer`].

pub mod error;
pub mod extract;
pub mod model;
pub mod ocr;
pub mod options;
pub mod orchestrator;
pub mod parser;
pub mod progress;

pub use error::{Error, ErrorKind, Result};
pub use extract::{
    ImageHarvester, ImageReport, PageImage, TableDetector, TableReport, TableStrategy,
    TextBackend, TextExtractionChain, TextResult,
};
pub use model::{
    CellValue, ColorMode, ColumnType, ContentType, ExtractionResult, ExtractionStats,
    ImageRecord, JsonFormat, Metadata, TableRecord, TableSource,
};
pub use ocr::{OcrEngine, PdftoppmRasterizer, Rasterizer, TesseractEngine};
pub use options::{
    EnhancementFactors, ExtractOptions, ImageOptions, TableOptions, TableStrategyKind,
    TextOptions,
};
pub use orchestrator::ExtractionOrchestrator;
pub use parser::{PageSource, PdfDocument};
pub use progress::{ChannelSink, LogSink, NullSink, ProgressEvent, ProgressSink, Stage, Status};

use std::path::Path;

/// Extract text, tables and images from a PDF file with default options.
///
/// # Example
///
/// ```no_run
/// let result = pdfharvest::extract_file("document.pdf").unwrap();
/// println!("{} pages", result.metadata.page_count);
/// ```
pub fn extract_file<P: AsRef<Path>>(path: P) -> Result<ExtractionResult> {
    extract_file_with_options(path, ExtractOptions::default())
}

/// Extract from a PDF file with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfharvest::{extract_file_with_options, ExtractOptions, TableOptions};
///
/// let options = ExtractOptions::new()
///     .with_table(TableOptions::default().with_min_rows(3).with_ocr_fallback(false))
///     .with_workers(4);
/// let result = extract_file_with_options("document.pdf", options).unwrap();
/// ```
pub fn extract_file_with_options<P: AsRef<Path>>(
    path: P,
    options: ExtractOptions,
) -> Result<ExtractionResult> {
    ExtractionOrchestrator::new(options).run(path, None)
}

/// Extract from PDF bytes with default options.
///
/// # Example
///
/// ```no_run
/// let data = std::fs::read("document.pdf").unwrap();
/// let result = pdfharvest::extract_bytes(data).unwrap();
/// ```
pub fn extract_bytes(data: Vec<u8>) -> Result<ExtractionResult> {
    ExtractionOrchestrator::new(ExtractOptions::default()).run_bytes(data, None)
}
