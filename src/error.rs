//! Error types for pdfharvest.

use std::io;
use thiserror::Error;

/// Result type alias for pdfharvest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during extraction.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading files or talking to external tools.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The input is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted and cannot be read.
    #[error("Document is encrypted")]
    Encrypted,

    /// The document could not be opened at all.
    #[error("Failed to open document: {0}")]
    DocumentOpen(#[source] Box<Error>),

    /// Every text backend produced empty output.
    #[error("No extractable text: all {0} text backends returned empty output")]
    NoExtractableText(usize),

    /// A single extraction backend failed.
    #[error("Backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    /// Processing a single page failed.
    #[error("Page {page}: {stage} failed: {message}")]
    Page {
        page: u32,
        stage: &'static str,
        message: String,
    },

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Error reported by the OCR engine.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Error rasterizing a page.
    #[error("Rasterization error: {0}")]
    Raster(String),

    /// Error decoding, enhancing or encoding an image.
    #[error("Image processing error: {0}")]
    Image(String),

    /// A required external program is not installed.
    #[error("Tool not available: {0}")]
    ToolNotAvailable(String),

    /// Configuration values are inconsistent.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Error serializing the extraction result.
    #[error("Serialization error: {0}")]
    Render(String),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Coarse classification of an [`Error`] used to decide whether a run can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// One backend, strategy or rasterization failed; caught locally and skipped.
    BackendFailure,
    /// All text backends returned empty output.
    NoExtractableText,
    /// The input cannot be opened or parsed as a PDF.
    DocumentOpenFailure,
    /// A single page's table or image stage failed.
    PageProcessingFailure,
    /// The supplied options are invalid.
    InvalidConfiguration,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownFormat
            | Error::UnsupportedVersion(_)
            | Error::PdfParse(_)
            | Error::Encrypted
            | Error::DocumentOpen(_) => ErrorKind::DocumentOpenFailure,
            Error::NoExtractableText(_) => ErrorKind::NoExtractableText,
            Error::Page { .. } | Error::PageOutOfRange(..) => ErrorKind::PageProcessingFailure,
            Error::InvalidConfig(_) => ErrorKind::InvalidConfiguration,
            Error::Io(_)
            | Error::Backend { .. }
            | Error::Ocr(_)
            | Error::Raster(_)
            | Error::Image(_)
            | Error::ToolNotAvailable(_)
            | Error::Render(_)
            | Error::Other(_) => ErrorKind::BackendFailure,
        }
    }

    /// Whether this error aborts the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NoExtractableText
                | ErrorKind::DocumentOpenFailure
                | ErrorKind::InvalidConfiguration
        )
    }

    /// Wrap an error raised while processing `page` in the given stage.
    pub(crate) fn page(page: u32, stage: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Page {
            page,
            stage,
            message: err.to_string(),
        }
    }

    pub(crate) fn backend(backend: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Error::Backend {
            backend: backend.into(),
            message: err.to_string(),
        }
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<pdf_extract::OutputError> for Error {
    fn from(err: pdf_extract::OutputError) -> Self {
        Error::backend("pdf-extract", err)
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}
