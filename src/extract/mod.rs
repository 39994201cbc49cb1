//! The three extraction stages.
//!
//! Each stage works against a [`PageSource`](crate::parser::PageSource)
//! and is independent of the others, so a failure in one never touches
//! the results of another.

pub mod image;
pub mod table;
pub mod text;

#[cfg(test)]
pub(crate) mod testing;

pub use self::image::{content_hash, HarvestedImage, ImageHarvester, ImageReport, PageImage};
pub use self::table::{
    strategy_for, validate_grid, CellGrid, LatticeStrategy, PageGeometry, Rejection,
    StreamConfig, StreamStrategy, TableDetector, TableReport, TableStrategy,
};
pub use self::text::{
    LayoutTextBackend, OcrTextBackend, PageText, PdfExtractBackend, TextBackend,
    TextExtractionChain, TextResult,
};
