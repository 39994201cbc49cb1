//! External OCR and page rasterization.
//!
//! Both seams are traits so that runs can be driven by in-process
//! implementations in tests, or by other engines in production.

mod pdftoppm;
mod tesseract;

use std::path::Path;

use image::DynamicImage;

use crate::error::Result;

pub use pdftoppm::PdftoppmRasterizer;
pub use tesseract::TesseractEngine;

/// Renders a single PDF page to a bitmap.
pub trait Rasterizer: Send + Sync {
    /// Render the 1-indexed `page` of the PDF at `pdf` with `dpi` resolution.
    fn rasterize(&self, pdf: &Path, page: u32, dpi: u32) -> Result<DynamicImage>;
}

/// Recognizes text in a bitmap.
pub trait OcrEngine: Send + Sync {
    /// Plain text with lines separated by `\n`.
    fn recognize(&self, image: &DynamicImage) -> Result<String>;
}

/// Map a spawn failure to a tool error, treating a missing binary specially.
pub(crate) fn spawn_error(tool: &str, hint: &str, err: std::io::Error) -> crate::Error {
    if err.kind() == std::io::ErrorKind::NotFound {
        crate::Error::ToolNotAvailable(format!("{} not found ({})", tool, hint))
    } else {
        crate::Error::Io(err)
    }
}
