//! Record types produced by an extraction run.
//!
//! Every record has fixed, typed fields so downstream consumers can
//! rely on its shape.

mod document;
mod image;
mod result;
mod table;

pub(crate) use document::collapse_whitespace;
pub use document::Metadata;
pub use self::image::{ColorMode, ContentType, ImageRecord};
pub use result::{ExtractionResult, ExtractionStats, JsonFormat};
pub use table::{CellValue, ColumnType, TableRecord, TableSource};
