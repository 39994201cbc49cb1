//! Whole-document text extraction with ordered backend fallback.
//!
//! Each backend is evaluated over the entire document. The first one whose
//! combined output is non-empty after trimming wins; later backends are not
//! consulted, even for pages the winner left empty.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use rayon::prelude::*;
use unicode_normalization::UnicodeNormalization;

use crate::error::{Error, Result};
use crate::ocr::{OcrEngine, Rasterizer};
use crate::options::TextOptions;
use crate::parser::{spans_to_text, PageSource};

/// Text produced by a backend for one page, or for the whole document
/// when the backend has no notion of page boundaries.
#[derive(Debug, Clone, PartialEq)]
pub struct PageText {
    pub page: Option<u32>,
    pub text: String,
}

impl PageText {
    pub fn page(page: u32, text: impl Into<String>) -> Self {
        Self {
            page: Some(page),
            text: text.into(),
        }
    }

    pub fn document(text: impl Into<String>) -> Self {
        Self {
            page: None,
            text: text.into(),
        }
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// One text extraction strategy.
pub trait TextBackend: Send + Sync {
    /// Short identifier reported in results and logs.
    fn name(&self) -> &'static str;

    /// Extract text from every page of the document, in page order.
    fn extract(&self, source: &dyn PageSource) -> Result<Vec<PageText>>;
}

/// Reads the embedded text layer through positioned-span layout analysis.
#[derive(Debug, Default, Clone)]
pub struct LayoutTextBackend;

impl TextBackend for LayoutTextBackend {
    fn name(&self) -> &'static str {
        "layout"
    }

    fn extract(&self, source: &dyn PageSource) -> Result<Vec<PageText>> {
        Ok(source
            .pages()
            .map(|page| match source.page_spans(page) {
                Ok(spans) => PageText::page(page, spans_to_text(spans.to_vec())),
                Err(e) => {
                    log::warn!("Layout text unavailable: {}", e);
                    PageText::page(page, "")
                }
            })
            .collect())
    }
}

/// Reads the embedded text layer with `pdf-extract`.
#[derive(Debug, Default, Clone)]
pub struct PdfExtractBackend;

impl TextBackend for PdfExtractBackend {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, source: &dyn PageSource) -> Result<Vec<PageText>> {
        // pdf-extract panics on some malformed inputs
        let text = catch_unwind(AssertUnwindSafe(|| {
            pdf_extract::extract_text_from_mem(source.bytes())
        }))
        .map_err(|_| Error::backend(self.name(), "panicked while parsing the document"))??;

        Ok(vec![PageText::document(text)])
    }
}

/// Rasterizes every page and recognizes text from pixels.
#[derive(Clone)]
pub struct OcrTextBackend {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn Rasterizer>,
    dpi: u32,
}

impl OcrTextBackend {
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn Rasterizer>, dpi: u32) -> Self {
        Self {
            ocr,
            rasterizer,
            dpi,
        }
    }

    fn recognize_page(&self, source: &dyn PageSource, page: u32) -> Result<String> {
        let image = self.rasterizer.rasterize(source.path(), page, self.dpi)?;
        self.ocr.recognize(&image)
    }
}

impl TextBackend for OcrTextBackend {
    fn name(&self) -> &'static str {
        "ocr"
    }

    fn extract(&self, source: &dyn PageSource) -> Result<Vec<PageText>> {
        let pages: Vec<u32> = source.pages().collect();
        Ok(pages
            .par_iter()
            .map(|&page| match self.recognize_page(source, page) {
                Ok(text) => PageText::page(page, text),
                Err(e) => {
                    log::warn!("Page {}: OCR text failed: {}", page, e);
                    PageText::page(page, "")
                }
            })
            .collect())
    }
}

/// Outcome of a successful chain evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextResult {
    /// Non-empty page texts joined in page order
    pub text: String,

    /// Name of the winning backend
    pub backend: String,

    /// Pages the winning backend returned no text for
    pub pages_without_text: Vec<u32>,
}

/// Ordered fallback across text backends.
pub struct TextExtractionChain {
    backends: Vec<Box<dyn TextBackend>>,
    separator: String,
    normalize: bool,
}

impl TextExtractionChain {
    /// The standard chain: layout text, then pdf-extract, then OCR.
    pub fn new(
        options: &TextOptions,
        ocr: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        Self::with_backends(
            vec![
                Box::new(LayoutTextBackend),
                Box::new(PdfExtractBackend),
                Box::new(OcrTextBackend::new(ocr, rasterizer, options.ocr_dpi)),
            ],
            options,
        )
    }

    /// A chain over custom backends, tried in the given order.
    pub fn with_backends(backends: Vec<Box<dyn TextBackend>>, options: &TextOptions) -> Self {
        Self {
            backends,
            separator: options.page_separator.clone(),
            normalize: options.normalize_unicode,
        }
    }

    pub fn backend_names(&self) -> Vec<&'static str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Run the chain over the whole document.
    ///
    /// Returns [`Error::NoExtractableText`] when every backend comes back
    /// empty or fails.
    pub fn extract(&self, source: &dyn PageSource) -> Result<TextResult> {
        for backend in &self.backends {
            let name = backend.name();
            let pages = match backend.extract(source) {
                Ok(pages) => pages,
                Err(e) => {
                    log::warn!("Text backend '{}' failed: {}", name, e);
                    continue;
                }
            };

            let text = self.join(&pages);
            if text.trim().is_empty() {
                log::debug!("Text backend '{}' produced no text", name);
                continue;
            }

            let pages_without_text: Vec<u32> = pages
                .iter()
                .filter(|p| p.is_blank())
                .filter_map(|p| p.page)
                .collect();
            if !pages_without_text.is_empty() {
                log::warn!(
                    "Text backend '{}' found no text on pages {:?}; later backends are not tried for them",
                    name,
                    pages_without_text
                );
            }

            log::info!("Extracted {} characters of text with '{}'", text.len(), name);
            return Ok(TextResult {
                text,
                backend: name.to_string(),
                pages_without_text,
            });
        }

        Err(Error::NoExtractableText(self.backends.len()))
    }

    fn join(&self, pages: &[PageText]) -> String {
        let joined = pages
            .iter()
            .filter(|p| !p.is_blank())
            .map(|p| p.text.trim())
            .collect::<Vec<_>>()
            .join(&self.separator);

        if self.normalize {
            joined.nfc().collect()
        } else {
            joined
        }
    }
}
