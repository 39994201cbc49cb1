//! Extraction options and configuration.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options for a full extraction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Text extraction chain settings
    pub text: TextOptions,

    /// Table detection settings
    pub table: TableOptions,

    /// Image harvesting settings
    pub image: ImageOptions,

    /// Worker pool size for page-level work (0 = number of CPUs)
    pub workers: usize,
}

impl ExtractOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load options from a JSON document; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| Error::InvalidConfig(format!("cannot parse options: {}", e)))?;
        options.validate()?;
        Ok(options)
    }

    /// Set text options.
    pub fn with_text(mut self, text: TextOptions) -> Self {
        self.text = text;
        self
    }

    /// Set table options.
    pub fn with_table(mut self, table: TableOptions) -> Self {
        self.table = table;
        self
    }

    /// Set image options.
    pub fn with_image(mut self, image: ImageOptions) -> Self {
        self.image = image;
        self
    }

    /// Set the worker pool size.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Run page-level work on a single thread.
    pub fn sequential(mut self) -> Self {
        self.workers = 1;
        self
    }

    /// Check that all settings are consistent.
    pub fn validate(&self) -> Result<()> {
        self.text.validate()?;
        self.table.validate()?;
        self.image.validate()
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            text: TextOptions::default(),
            table: TableOptions::default(),
            image: ImageOptions::default(),
            workers: 0,
        }
    }
}

/// Settings for the text extraction chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextOptions {
    /// Resolution used when rasterizing pages for OCR
    pub ocr_dpi: u32,

    /// OCR language code (e.g., "eng", "eng+deu")
    pub language: String,

    /// Separator placed between page texts
    pub page_separator: String,

    /// Apply Unicode NFC normalization to the final text
    pub normalize_unicode: bool,
}

impl TextOptions {
    /// Set the OCR resolution.
    pub fn with_ocr_dpi(mut self, dpi: u32) -> Self {
        self.ocr_dpi = dpi;
        self
    }

    /// Set the OCR language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the page separator.
    pub fn with_page_separator(mut self, separator: impl Into<String>) -> Self {
        self.page_separator = separator.into();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.ocr_dpi == 0 {
            return Err(Error::InvalidConfig("text OCR dpi must be positive".into()));
        }
        if self.language.trim().is_empty() {
            return Err(Error::InvalidConfig("OCR language must not be empty".into()));
        }
        Ok(())
    }
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            ocr_dpi: 300,
            language: "eng".to_string(),
            page_separator: "\n\n".to_string(),
            normalize_unicode: true,
        }
    }
}

/// Table detection strategy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStrategyKind {
    /// Ruling lattice with tight intersection tolerance
    Default,
    /// Column alignment of text spans, no rulings needed
    Text,
    /// Ruling lattice with loose intersection tolerance
    Lines,
}

impl TableStrategyKind {
    /// Stable name used in logs and provenance.
    pub fn name(&self) -> &'static str {
        match self {
            TableStrategyKind::Default => "default",
            TableStrategyKind::Text => "text",
            TableStrategyKind::Lines => "lines",
        }
    }
}

/// Settings for table detection and validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableOptions {
    /// Minimum number of rows a candidate must have
    pub min_rows: usize,

    /// Minimum number of cells every row must have
    pub min_columns: usize,

    /// Empty cells must make up less than this fraction of all cells
    pub max_empty_ratio: f64,

    /// Structural strategies, run in this order on every page
    pub strategies: Vec<TableStrategyKind>,

    /// Fall back to OCR on pages where no strategy found a candidate
    pub ocr_fallback: bool,

    /// Resolution used when rasterizing pages for the OCR fallback
    pub ocr_dpi: u32,
}

impl TableOptions {
    /// Set the minimum row count.
    pub fn with_min_rows(mut self, rows: usize) -> Self {
        self.min_rows = rows;
        self
    }

    /// Set the minimum column count.
    pub fn with_min_columns(mut self, columns: usize) -> Self {
        self.min_columns = columns;
        self
    }

    /// Set the maximum empty-cell ratio.
    pub fn with_max_empty_ratio(mut self, ratio: f64) -> Self {
        self.max_empty_ratio = ratio;
        self
    }

    /// Set the strategies to run.
    pub fn with_strategies(mut self, strategies: Vec<TableStrategyKind>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Enable or disable the OCR fallback.
    pub fn with_ocr_fallback(mut self, enabled: bool) -> Self {
        self.ocr_fallback = enabled;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.min_rows == 0 || self.min_columns == 0 {
            return Err(Error::InvalidConfig(
                "table min rows and min columns must be at least 1".into(),
            ));
        }
        if !(self.max_empty_ratio > 0.0 && self.max_empty_ratio <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "max empty ratio {} is outside (0, 1]",
                self.max_empty_ratio
            )));
        }
        if self.strategies.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one table strategy is required".into(),
            ));
        }
        if self.ocr_dpi == 0 {
            return Err(Error::InvalidConfig("table OCR dpi must be positive".into()));
        }
        Ok(())
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_empty_ratio: 0.5,
            strategies: vec![
                TableStrategyKind::Default,
                TableStrategyKind::Text,
                TableStrategyKind::Lines,
            ],
            ocr_fallback: true,
            ocr_dpi: 300,
        }
    }
}

/// Settings for page image harvesting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageOptions {
    /// Minimum accepted image width in pixels
    pub min_width: u32,

    /// Minimum accepted image height in pixels
    pub min_height: u32,

    /// Maximum accepted image width in pixels
    pub max_width: u32,

    /// Maximum accepted image height in pixels
    pub max_height: u32,

    /// Rasterization resolution
    pub dpi: u32,

    /// Enhancement factors, applied as contrast then brightness then sharpness
    pub enhancement: EnhancementFactors,
}

impl ImageOptions {
    /// Set the rasterization resolution.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi;
        self
    }

    /// Set the minimum accepted dimensions.
    pub fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_width = width;
        self.min_height = height;
        self
    }

    /// Set the maximum accepted dimensions.
    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    /// Set the enhancement factors.
    pub fn with_enhancement(mut self, enhancement: EnhancementFactors) -> Self {
        self.enhancement = enhancement;
        self
    }

    /// Whether an image of the given size passes the dimension filter.
    pub fn accepts(&self, width: u32, height: u32) -> bool {
        width >= self.min_width
            && height >= self.min_height
            && width <= self.max_width
            && height <= self.max_height
    }

    fn validate(&self) -> Result<()> {
        if self.dpi == 0 {
            return Err(Error::InvalidConfig("image dpi must be positive".into()));
        }
        if self.min_width > self.max_width || self.min_height > self.max_height {
            return Err(Error::InvalidConfig(format!(
                "image minimum {}x{} exceeds maximum {}x{}",
                self.min_width, self.min_height, self.max_width, self.max_height
            )));
        }
        self.enhancement.validate()
    }
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            min_width: 100,
            min_height: 100,
            max_width: 8000,
            max_height: 8000,
            dpi: 600,
            enhancement: EnhancementFactors::default(),
        }
    }
}

/// Image enhancement factors (1.0 leaves the image unchanged).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementFactors {
    pub contrast: f32,
    pub brightness: f32,
    pub sharpness: f32,
}

impl EnhancementFactors {
    /// Factors that leave pixels untouched.
    pub fn identity() -> Self {
        Self {
            contrast: 1.0,
            brightness: 1.0,
            sharpness: 1.0,
        }
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("contrast", self.contrast),
            ("brightness", self.brightness),
            ("sharpness", self.sharpness),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} factor must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for EnhancementFactors {
    fn default() -> Self {
        Self {
            contrast: 1.5,
            brightness: 1.2,
            sharpness: 1.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ExtractOptions::default();
        assert_eq!(options.image.dpi, 600);
        assert_eq!(options.image.min_width, 100);
        assert_eq!(options.image.max_height, 8000);
        assert_eq!(options.image.enhancement.contrast, 1.5);
        assert_eq!(options.image.enhancement.brightness, 1.2);
        assert_eq!(options.image.enhancement.sharpness, 1.8);
        assert_eq!(options.table.min_rows, 2);
        assert_eq!(options.table.min_columns, 2);
        assert_eq!(options.table.max_empty_ratio, 0.5);
        assert_eq!(options.table.strategies.len(), 3);
        assert_eq!(options.workers, 0);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_builder() {
        let options = ExtractOptions::new()
            .sequential()
            .with_image(ImageOptions::default().with_dpi(150).with_min_size(10, 10))
            .with_table(TableOptions::default().with_max_empty_ratio(0.3));

        assert_eq!(options.workers, 1);
        assert_eq!(options.image.dpi, 150);
        assert_eq!(options.image.min_height, 10);
        assert_eq!(options.table.max_empty_ratio, 0.3);
    }

    #[test]
    fn test_validate_rejects_inconsistent_settings() {
        let options =
            ExtractOptions::new().with_image(ImageOptions::default().with_min_size(9000, 100));
        assert!(matches!(options.validate(), Err(Error::InvalidConfig(_))));

        let options =
            ExtractOptions::new().with_table(TableOptions::default().with_max_empty_ratio(0.0));
        assert!(options.validate().is_err());

        let options = ExtractOptions::new().with_table(TableOptions::default().with_strategies(vec![]));
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_from_json_partial() {
        let options = ExtractOptions::from_json(
            r#"{"image": {"dpi": 300}, "table": {"strategies": ["text"]}, "workers": 2}"#,
        )
        .unwrap();
        assert_eq!(options.image.dpi, 300);
        assert_eq!(options.image.min_width, 100);
        assert_eq!(options.table.strategies, vec![TableStrategyKind::Text]);
        assert_eq!(options.workers, 2);
        assert_eq!(options.text.language, "eng");
    }

    #[test]
    fn test_accepts_dimensions() {
        let image = ImageOptions::default();
        assert!(image.accepts(100, 100));
        assert!(image.accepts(8000, 8000));
        assert!(!image.accepts(99, 500));
        assert!(!image.accepts(500, 8001));
    }
}
