//! In-memory collaborators for extraction unit tests.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{DynamicImage, GrayImage, Luma};

use crate::error::{Error, Result};
use crate::model::Metadata;
use crate::ocr::{OcrEngine, Rasterizer};
use crate::parser::{PageSource, Ruling, TextSpan};

#[derive(Default, Clone)]
pub(crate) struct MockPage {
    pub spans: Vec<TextSpan>,
    pub rulings: Vec<Ruling>,
    pub broken: bool,
}

impl MockPage {
    pub fn with_lines(lines: &[&str]) -> Self {
        let spans = lines
            .iter()
            .enumerate()
            .map(|(i, line)| {
                TextSpan::new(line.to_string(), 72.0, 700.0 - i as f32 * 14.0, 12.0, "F1".into())
            })
            .collect();
        Self {
            spans,
            ..Default::default()
        }
    }

    pub fn with_spans(spans: Vec<TextSpan>) -> Self {
        Self {
            spans,
            ..Default::default()
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }
}

pub(crate) struct MockSource {
    pub pages: Vec<MockPage>,
    pub path: PathBuf,
    pub bytes: Vec<u8>,
    pub metadata: Metadata,
}

impl MockSource {
    pub fn new(pages: Vec<MockPage>) -> Self {
        Self {
            pages,
            path: PathBuf::from("/tmp/mock.pdf"),
            bytes: b"%PDF-1.5\n".to_vec(),
            metadata: Metadata::with_version("1.5"),
        }
    }

    /// A document of `n` pages without any text layer.
    pub fn blank(n: usize) -> Self {
        Self::new(vec![MockPage::default(); n])
    }

    fn page(&self, page: u32) -> Result<&MockPage> {
        let mock = page
            .checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .ok_or(Error::PageOutOfRange(page, self.pages.len() as u32))?;
        if mock.broken {
            return Err(Error::page(page, "text layout", "corrupt content stream"));
        }
        Ok(mock)
    }
}

impl PageSource for MockSource {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_spans(&self, page: u32) -> Result<&[TextSpan]> {
        Ok(&self.page(page)?.spans)
    }

    fn page_rulings(&self, page: u32) -> Result<&[Ruling]> {
        Ok(&self.page(page)?.rulings)
    }

    fn page_height(&self, _page: u32) -> f32 {
        792.0
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Rasterizer returning canned images.
///
/// Pages without a canned image render as a 200x200 gray image whose
/// pixels all carry the page number, which [`MockOcr`] reads back.
#[derive(Default)]
pub(crate) struct MockRasterizer {
    pub images: HashMap<u32, DynamicImage>,
    pub failing: HashSet<u32>,
    pub calls: AtomicUsize,
}

impl MockRasterizer {
    pub fn with_image(mut self, page: u32, image: DynamicImage) -> Self {
        self.images.insert(page, image);
        self
    }

    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing.insert(page);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Rasterizer for MockRasterizer {
    fn rasterize(&self, _pdf: &Path, page: u32, _dpi: u32) -> Result<DynamicImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&page) {
            return Err(Error::Raster(format!("cannot render page {}", page)));
        }
        Ok(self.images.get(&page).cloned().unwrap_or_else(|| {
            DynamicImage::ImageLuma8(GrayImage::from_pixel(200, 200, Luma([page as u8])))
        }))
    }
}

/// OCR engine answering from a per-page script.
#[derive(Default)]
pub(crate) struct MockOcr {
    pub pages: HashMap<u32, String>,
    pub calls: AtomicUsize,
}

impl MockOcr {
    pub fn with_page(mut self, page: u32, text: &str) -> Self {
        self.pages.insert(page, text.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcr {
    fn recognize(&self, image: &DynamicImage) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let page = image.to_luma8().get_pixel(0, 0)[0] as u32;
        Ok(self.pages.get(&page).cloned().unwrap_or_default())
    }
}
