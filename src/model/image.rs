//! Harvested page image records.

use base64::Engine;
use serde::{Serialize, Serializer};

/// Coarse content hint derived from the aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Document,
    Figure,
    Table,
    Image,
}

impl ContentType {
    /// Classify by width/height ratio.
    ///
    /// `[0.70, 0.75]` is document, `[1.3, 1.5]` figure, above 1.5 table,
    /// anything else a plain image. This is a hint only.
    pub fn classify(width: u32, height: u32) -> Self {
        if height == 0 {
            return ContentType::Image;
        }
        let ratio = width as f64 / height as f64;
        if (0.70..=0.75).contains(&ratio) {
            ContentType::Document
        } else if (1.3..=1.5).contains(&ratio) {
            ContentType::Figure
        } else if ratio > 1.5 {
            ContentType::Table
        } else {
            ContentType::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Document => "document",
            ContentType::Figure => "figure",
            ContentType::Table => "table",
            ContentType::Image => "image",
        }
    }
}

/// Pixel layout of the stored image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Gray,
    Rgb,
}

impl ColorMode {
    /// Bytes per pixel.
    pub fn channels(&self) -> usize {
        match self {
            ColorMode::Gray => 1,
            ColorMode::Rgb => 3,
        }
    }
}

/// A deduplicated, enhanced page image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// PNG-encoded payload (base64 in serialized form)
    #[serde(rename = "base64_image", serialize_with = "serialize_base64")]
    pub data: Vec<u8>,

    pub width: u32,
    pub height: u32,

    /// Aspect-ratio content hint
    pub content_type: ContentType,

    /// Encoding tag, always `"PNG"`
    pub format: String,

    /// Hex MD5 of the enhanced raw pixel buffer
    pub hash: String,

    /// Rasterization resolution
    pub dpi: u32,

    pub color: ColorMode,
}

impl ImageRecord {
    /// Base64 form of the encoded payload.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.data)
    }
}

fn serialize_base64<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(data))
}
