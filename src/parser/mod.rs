//! PDF parsing: document loading, positioned text and ruling lines.

mod document;
mod layout;
mod rulings;
mod source;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::PdfDocument;
pub use layout::{group_into_lines, spans_to_text, Column, LayoutAnalyzer, TextLine, TextSpan};
pub use rulings::{rulings_from_content, Orientation, Ruling};
pub use source::PageSource;
