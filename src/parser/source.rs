//! Page-level access shared by the extraction components.

use std::path::Path;

use crate::error::Result;
use crate::model::Metadata;

use super::{Ruling, TextSpan};

/// Read-only view of an opened document.
///
/// Implementations must be safe to share across worker threads; every
/// component receives the same source and reads pages concurrently.
pub trait PageSource: Sync {
    /// Number of pages, at least 1 for any opened document.
    fn page_count(&self) -> u32;

    /// Positioned text spans of a 1-indexed page.
    fn page_spans(&self, page: u32) -> Result<&[TextSpan]>;

    /// Ruling lines of a 1-indexed page, in top-down coordinates.
    fn page_rulings(&self, page: u32) -> Result<&[Ruling]>;

    /// Page height in points.
    fn page_height(&self, page: u32) -> f32;

    /// Filesystem location handed to external tools.
    fn path(&self) -> &Path;

    /// Raw PDF bytes.
    fn bytes(&self) -> &[u8];

    /// Document metadata.
    fn metadata(&self) -> &Metadata;

    /// 1-indexed page numbers in order.
    fn pages(&self) -> std::ops::RangeInclusive<u32> {
        1..=self.page_count()
    }
}
