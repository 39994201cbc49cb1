//! Tesseract OCR via the command-line tool.

use std::process::Command;

use image::DynamicImage;

use super::{spawn_error, OcrEngine};
use crate::error::{Error, Result};

/// Page segmentation mode: a single uniform block of text.
const PAGE_SEGMENTATION_MODE: &str = "6";

/// Tesseract OCR engine.
#[derive(Debug, Clone)]
pub struct TesseractEngine {
    language: String,
}

impl TesseractEngine {
    /// Create an engine for the given tesseract language code (e.g. `"eng"`).
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }
}

impl Default for TesseractEngine {
    fn default() -> Self {
        Self::new("eng")
    }
}

impl OcrEngine for TesseractEngine {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        let file = tempfile::Builder::new()
            .prefix("pdfharvest-ocr-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(file.path(), image::ImageFormat::Png)?;

        let output = Command::new("tesseract")
            .arg(file.path())
            .arg("stdout")
            .args(["-l", &self.language, "--psm", PAGE_SEGMENTATION_MODE])
            .output()
            .map_err(|e| spawn_error("tesseract", "install tesseract-ocr", e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Ocr(format!("tesseract failed: {}", stderr.trim())));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
