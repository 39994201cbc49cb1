//! Page rasterization with poppler's `pdftoppm`.

use std::path::Path;
use std::process::Command;

use image::DynamicImage;

use super::{spawn_error, Rasterizer};
use crate::error::{Error, Result};

/// Rasterizer backed by the `pdftoppm` command.
#[derive(Debug, Clone, Default)]
pub struct PdftoppmRasterizer;

impl PdftoppmRasterizer {
    pub fn new() -> Self {
        Self
    }
}

impl Rasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf: &Path, page: u32, dpi: u32) -> Result<DynamicImage> {
        let dir = tempfile::TempDir::new()?;
        let prefix = dir.path().join("page");
        let page_str = page.to_string();
        let dpi_str = dpi.to_string();

        let output = Command::new("pdftoppm")
            .args(["-png", "-r", &dpi_str, "-f", &page_str, "-l", &page_str, "-singlefile"])
            .arg(pdf)
            .arg(&prefix)
            .output()
            .map_err(|e| spawn_error("pdftoppm", "install poppler-utils", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Raster(format!(
                "pdftoppm failed on page {}: {}",
                page,
                stderr.trim()
            )));
        }

        // -singlefile writes exactly <prefix>.png
        let image_path = prefix.with_extension("png");
        if !image_path.exists() {
            return Err(Error::Raster(format!("No image generated for page {}", page)));
        }
        Ok(image::open(&image_path)?)
    }
}
