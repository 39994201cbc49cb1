//! Point and neighbourhood enhancement on 8-bit pixel buffers.
//!
//! Each operation blends the image with a degenerate version of itself:
//! `out = degenerate + factor * (pixel - degenerate)`. A factor of 1.0
//! leaves the image unchanged. Results are rounded and clamped to 8 bits
//! after every step.

use image::{imageops, DynamicImage, ImageBuffer, Luma, Pixel, Rgb};

use crate::model::ColorMode;
use crate::options::EnhancementFactors;

/// Smoothing kernel used as the degenerate image for sharpening,
/// normalized by its sum (13).
const SMOOTH_KERNEL: [f32; 9] = [1.0, 1.0, 1.0, 1.0, 5.0, 1.0, 1.0, 1.0, 1.0];

/// A page bitmap in a normalized color mode.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pub width: u32,
    pub height: u32,
    pub color: ColorMode,
    /// Row-major interleaved samples, `color.channels()` per pixel
    pub pixels: Vec<u8>,
}

impl PageImage {
    /// Normalize to 8-bit grayscale (kept only if already 8-bit gray) or RGB.
    pub fn normalize(image: DynamicImage) -> Self {
        let (width, height) = (image.width(), image.height());
        match image {
            DynamicImage::ImageLuma8(gray) => Self {
                width,
                height,
                color: ColorMode::Gray,
                pixels: gray.into_raw(),
            },
            other => Self {
                width,
                height,
                color: ColorMode::Rgb,
                pixels: other.to_rgb8().into_raw(),
            },
        }
    }

    /// Apply contrast, brightness and sharpness, in that order.
    pub fn enhance(&mut self, factors: &EnhancementFactors) {
        self.contrast(factors.contrast);
        self.brightness(factors.brightness);
        self.sharpness(factors.sharpness);
    }

    /// Blend toward the mean gray level.
    pub fn contrast(&mut self, factor: f32) {
        if factor == 1.0 || self.pixels.is_empty() {
            return;
        }
        let mean = self.mean_luminance() as f32;
        for px in &mut self.pixels {
            *px = blend(mean, *px as f32, factor);
        }
    }

    /// Blend toward black.
    pub fn brightness(&mut self, factor: f32) {
        if factor == 1.0 {
            return;
        }
        for px in &mut self.pixels {
            *px = blend(0.0, *px as f32, factor);
        }
    }

    /// Blend away from a smoothed copy. Border pixels are left as is.
    pub fn sharpness(&mut self, factor: f32) {
        if factor == 1.0 || self.width < 3 || self.height < 3 {
            return;
        }
        let smooth = match self.color {
            ColorMode::Gray => smoothed::<Luma<u8>>(self.width, self.height, &self.pixels),
            ColorMode::Rgb => smoothed::<Rgb<u8>>(self.width, self.height, &self.pixels),
        };
        let Some(smooth) = smooth else {
            return;
        };

        let channels = self.color.channels();
        let (w, h) = (self.width as usize, self.height as usize);
        for (i, (px, base)) in self.pixels.iter_mut().zip(smooth).enumerate() {
            let (x, y) = ((i / channels) % w, (i / channels) / w);
            if x == 0 || y == 0 || x == w - 1 || y == h - 1 {
                continue;
            }
            *px = blend(base as f32, *px as f32, factor);
        }
    }

    /// Rounded mean of the grayscale rendition.
    fn mean_luminance(&self) -> u32 {
        let (sum, count) = match self.color {
            ColorMode::Gray => (
                self.pixels.iter().map(|&p| p as u64).sum::<u64>(),
                self.pixels.len() as u64,
            ),
            ColorMode::Rgb => (
                self.pixels
                    .chunks_exact(3)
                    .map(|p| luminance(p[0], p[1], p[2]) as u64)
                    .sum::<u64>(),
                (self.pixels.len() / 3) as u64,
            ),
        };
        ((sum as f64 / count as f64) + 0.5) as u32
    }
}

/// Smoothed copy of an interleaved buffer; border pixels are not filtered.
fn smoothed<P: Pixel<Subpixel = u8> + 'static>(width: u32, height: u32, pixels: &[u8]) -> Option<Vec<u8>> {
    let view = ImageBuffer::<P, &[u8]>::from_raw(width, height, pixels)?;
    Some(imageops::filter3x3(&view, &SMOOTH_KERNEL).into_raw())
}

/// ITU-R 601-2 luma, rounded.
fn luminance(r: u8, g: u8, b: u8) -> u32 {
    (r as u32 * 299 + g as u32 * 587 + b as u32 * 114 + 500) / 1000
}

fn blend(degenerate: f32, pixel: f32, factor: f32) -> u8 {
    (degenerate + factor * (pixel - degenerate)).round().clamp(0.0, 255.0) as u8
}
