//! Page image harvesting.
//!
//! Every page is rasterized, filtered by size, normalized, enhanced,
//! hashed over its enhanced pixel buffer and encoded to PNG on the worker
//! that rendered it; raw pixels never outlive their page. Hashes are
//! merged once in page order, so the first page showing an image keeps it.

mod enhance;

use std::collections::HashSet;
use std::sync::Arc;

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder};
use md5::{Digest, Md5};
use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::model::{ColorMode, ContentType, ExtractionStats, ImageRecord};
use crate::ocr::Rasterizer;
use crate::options::ImageOptions;
use crate::parser::PageSource;

pub use enhance::PageImage;

/// Format tag of encoded payloads.
const FORMAT_TAG: &str = "PNG";

/// Images of a whole document with harvesting statistics.
#[derive(Debug, Clone, Default)]
pub struct ImageReport {
    /// Unique images ordered by page
    pub images: Vec<ImageRecord>,
    pub stats: ExtractionStats,
}

/// An encoded page image with the hash of its enhanced pixels.
#[derive(Debug, Clone)]
pub struct HarvestedImage {
    pub page: u32,
    pub hash: String,
    pub width: u32,
    pub height: u32,
    pub color: ColorMode,
    /// PNG-encoded payload
    pub data: Vec<u8>,
}

/// Per-page harvesting result before deduplication.
#[derive(Debug)]
enum PageOutcome {
    Harvested(HarvestedImage),
    /// Rendered, but outside the configured size bounds
    Rejected { width: u32, height: u32 },
}

/// Rasterizes, enhances and deduplicates page images.
pub struct ImageHarvester {
    options: ImageOptions,
    rasterizer: Arc<dyn Rasterizer>,
}

impl ImageHarvester {
    pub fn new(options: ImageOptions, rasterizer: Arc<dyn Rasterizer>) -> Self {
        Self {
            options,
            rasterizer,
        }
    }

    pub fn options(&self) -> &ImageOptions {
        &self.options
    }

    /// Harvest images from every page.
    pub fn extract(&self, source: &dyn PageSource) -> ImageReport {
        self.extract_with_progress(source, &|_| {})
    }

    /// Harvest images from every page, calling `on_page` as each page finishes.
    pub fn extract_with_progress(
        &self,
        source: &dyn PageSource,
        on_page: &(dyn Fn(u32) + Sync),
    ) -> ImageReport {
        let pages: Vec<u32> = source.pages().collect();
        let outcomes: Vec<(u32, Result<PageOutcome>)> = pages
            .par_iter()
            .map(|&page| {
                let outcome = self.process_page(source, page);
                on_page(page);
                (page, outcome)
            })
            .collect();

        let mut stats = ExtractionStats {
            page_count: source.page_count(),
            ..Default::default()
        };
        let mut seen = HashSet::new();
        let mut images = Vec::new();

        for (page, outcome) in outcomes {
            match outcome {
                Ok(PageOutcome::Harvested(harvested)) => {
                    stats.images_rasterized += 1;
                    if seen.insert(harvested.hash.clone()) {
                        images.push(self.to_record(harvested));
                    } else {
                        log::debug!("Page {}: duplicate image {}", page, harvested.hash);
                        stats.duplicate_images += 1;
                    }
                }
                Ok(PageOutcome::Rejected { width, height }) => {
                    stats.images_rasterized += 1;
                    stats.images_rejected += 1;
                    log::debug!("Page {}: image {}x{} outside size bounds", page, width, height);
                }
                Err(e) => {
                    log::warn!("Page {}: image harvesting failed: {}", page, e);
                    stats.failed_pages += 1;
                }
            }
        }

        log::info!(
            "Harvested {} unique images ({} duplicates, {} rejected)",
            images.len(),
            stats.duplicate_images,
            stats.images_rejected
        );
        ImageReport { images, stats }
    }

    /// Rasterize, validate, enhance and encode a single page.
    ///
    /// Returns `None` when the rendered page is outside the size bounds.
    pub fn harvest_page(&self, source: &dyn PageSource, page: u32) -> Result<Option<HarvestedImage>> {
        match self.process_page(source, page)? {
            PageOutcome::Harvested(h) => Ok(Some(h)),
            PageOutcome::Rejected { .. } => Ok(None),
        }
    }

    fn process_page(&self, source: &dyn PageSource, page: u32) -> Result<PageOutcome> {
        if page == 0 || page > source.page_count() {
            return Err(Error::PageOutOfRange(page, source.page_count()));
        }

        let rendered = self
            .rasterizer
            .rasterize(source.path(), page, self.options.dpi)
            .map_err(|e| Error::page(page, "rasterization", e))?;

        let (width, height) = (rendered.width(), rendered.height());
        if !self.options.accepts(width, height) {
            return Ok(PageOutcome::Rejected { width, height });
        }

        let mut image = PageImage::normalize(rendered);
        image.enhance(&self.options.enhancement);
        let hash = content_hash(&image.pixels);
        let data = encode_png(&image).map_err(|e| Error::page(page, "image encoding", e))?;

        Ok(PageOutcome::Harvested(HarvestedImage {
            page,
            hash,
            width: image.width,
            height: image.height,
            color: image.color,
            data,
        }))
    }

    fn to_record(&self, harvested: HarvestedImage) -> ImageRecord {
        ImageRecord {
            page_number: harvested.page,
            data: harvested.data,
            width: harvested.width,
            height: harvested.height,
            content_type: ContentType::classify(harvested.width, harvested.height),
            format: FORMAT_TAG.to_string(),
            hash: harvested.hash,
            dpi: self.options.dpi,
            color: harvested.color,
        }
    }
}

/// Hex MD5 of a raw pixel buffer.
pub fn content_hash(pixels: &[u8]) -> String {
    format!("{:x}", Md5::digest(pixels))
}

fn encode_png(image: &PageImage) -> Result<Vec<u8>> {
    let color = match image.color {
        ColorMode::Gray => ExtendedColorType::L8,
        ColorMode::Rgb => ExtendedColorType::Rgb8,
    };
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf).write_image(&image.pixels, image.width, image.height, color)?;
    Ok(buf)
}
