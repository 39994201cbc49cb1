//! Opened PDF document with per-page data loaded up front.

use std::io::Write;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::model::{collapse_whitespace, Metadata};

use super::layout::{page_content, LayoutAnalyzer, TextSpan};
use super::rulings::{media_box_height, rulings_from_content, Ruling};
use super::source::PageSource;

/// The PDF header must start within this many leading bytes.
const HEADER_SEARCH_LIMIT: usize = 1024;

/// Parent chain depth followed when resolving inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 16;

/// Per-page data captured while the lopdf document is alive.
///
/// A page that fails to parse keeps its error message so that only the
/// stages reading that page see the failure.
#[derive(Debug)]
struct PageData {
    height: f32,
    spans: std::result::Result<Vec<TextSpan>, String>,
    rulings: std::result::Result<Vec<Ruling>, String>,
}

/// An opened PDF.
///
/// All page content is parsed once at open time, so the value is cheap to
/// share between worker threads. Documents opened from memory are spilled
/// to a temporary file for external tools; the file is removed on drop.
#[derive(Debug)]
pub struct PdfDocument {
    data: Vec<u8>,
    path: PathBuf,
    metadata: Metadata,
    pages: Vec<PageData>,
    _spill: Option<NamedTempFile>,
}

impl PdfDocument {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)?;
        Self::load(data, path.to_path_buf(), None)
    }

    /// Open a PDF held in memory.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        // Reject non-PDF input before touching the filesystem
        detect_version(&data)?;

        let mut spill = tempfile::Builder::new()
            .prefix("pdfharvest-")
            .suffix(".pdf")
            .tempfile()?;
        spill.write_all(&data)?;
        spill.flush()?;

        let path = spill.path().to_path_buf();
        Self::load(data, path, Some(spill))
    }

    fn load(data: Vec<u8>, path: PathBuf, spill: Option<NamedTempFile>) -> Result<Self> {
        let header_version = detect_version(&data)?;

        let doc = LopdfDocument::load_mem(&data)?;
        let page_ids = doc.get_pages();
        if page_ids.is_empty() {
            return Err(Error::PdfParse("document has no pages".to_string()));
        }

        let analyzer = LayoutAnalyzer::new(&doc);
        let pages = page_ids
            .iter()
            .map(|(&number, &page_id)| load_page(&doc, &analyzer, number, page_id))
            .collect::<Vec<_>>();

        let mut metadata = extract_metadata(&doc);
        if metadata.pdf_version.is_empty() {
            metadata.pdf_version = header_version;
        }
        metadata.page_count = pages.len() as u32;
        metadata.file_size = data.len() as u64;

        log::debug!(
            "Opened {} ({} pages, PDF {})",
            path.display(),
            metadata.page_count,
            metadata.pdf_version
        );

        Ok(Self {
            data,
            path,
            metadata,
            pages,
            _spill: spill,
        })
    }

    fn page(&self, page: u32) -> Result<&PageData> {
        page.checked_sub(1)
            .and_then(|i| self.pages.get(i as usize))
            .ok_or(Error::PageOutOfRange(page, self.pages.len() as u32))
    }
}

impl PageSource for PdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_spans(&self, page: u32) -> Result<&[TextSpan]> {
        match &self.page(page)?.spans {
            Ok(spans) => Ok(spans),
            Err(message) => Err(Error::page(page, "text layout", message)),
        }
    }

    fn page_rulings(&self, page: u32) -> Result<&[Ruling]> {
        match &self.page(page)?.rulings {
            Ok(rulings) => Ok(rulings),
            Err(message) => Err(Error::page(page, "ruling extraction", message)),
        }
    }

    fn page_height(&self, page: u32) -> f32 {
        self.page(page).map(|p| p.height).unwrap_or(792.0)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

fn load_page(
    doc: &LopdfDocument,
    analyzer: &LayoutAnalyzer<'_>,
    number: u32,
    page_id: ObjectId,
) -> PageData {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox").and_then(|o| o.as_array().ok());
    let height = media_box_height(media_box.map(|arr| arr.as_slice()));

    let spans = analyzer.extract_page_spans(page_id).map_err(|e| {
        log::warn!("Page {}: text layout failed: {}", number, e);
        e.to_string()
    });

    let rulings = page_content(doc, page_id)
        .and_then(|content| rulings_from_content(&content, height))
        .map_err(|e| {
            log::warn!("Page {}: ruling extraction failed: {}", number, e);
            e.to_string()
        });

    PageData {
        height,
        spans,
        rulings,
    }
}

/// Look up a page attribute, following `Parent` links for inherited values.
fn inherited_attribute<'a>(
    doc: &'a LopdfDocument,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = dict.get(key) {
            return match value {
                Object::Reference(id) => doc.get_object(*id).ok(),
                other => Some(other),
            };
        }
        let parent = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Validate the `%PDF-x.y` header and return its version.
pub(crate) fn detect_version(data: &[u8]) -> Result<String> {
    let window = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
    let start = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or(Error::UnknownFormat)?;

    let version_bytes = data.get(start + 5..start + 8).ok_or(Error::UnknownFormat)?;
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }
    Ok(version)
}

fn is_valid_version(version: &str) -> bool {
    let bytes = version.as_bytes();
    bytes.len() == 3
        && matches!(bytes[0], b'1' | b'2')
        && bytes[1] == b'.'
        && bytes[2].is_ascii_digit()
}

fn extract_metadata(doc: &LopdfDocument) -> Metadata {
    let mut metadata = Metadata::with_version(doc.version.to_string());
    metadata.encrypted = doc.is_encrypted();

    let info = match doc.trailer.get(b"Info") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    let Some(info) = info else {
        return metadata;
    };

    let text = |key: &[u8]| {
        get_string_from_dict(info, key)
            .map(|s| collapse_whitespace(&s))
            .filter(|s| !s.is_empty())
    };

    metadata.title = text(b"Title");
    metadata.author = text(b"Author");
    metadata.subject = text(b"Subject");
    metadata.creator = text(b"Creator");
    metadata.producer = text(b"Producer");
    if let Some(keywords) = get_string_from_dict(info, b"Keywords") {
        metadata.set_keywords(&keywords);
    }
    metadata.created = get_string_from_dict(info, b"CreationDate").and_then(|s| parse_pdf_date(&s));
    metadata.modified = get_string_from_dict(info, b"ModDate").and_then(|s| parse_pdf_date(&s));

    metadata
}

/// Decode a text string entry (UTF-16BE with BOM, UTF-8, or Latin-1).
fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => {
            if let Some(body) = bytes.strip_prefix(&[0xFE, 0xFF]) {
                let units: Vec<u16> = body
                    .chunks_exact(2)
                    .map(|c| u16::from_be_bytes([c[0], c[1]]))
                    .collect();
                String::from_utf16(&units).ok()
            } else {
                Some(
                    String::from_utf8(bytes.clone())
                        .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect()),
                )
            }
        }
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    }
}

/// Parse a PDF date string (`D:YYYYMMDDHHmmSS` with optional trailing zone).
///
/// The zone suffix is ignored; the timestamp is taken as UTC.
pub(crate) fn parse_pdf_date(s: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let s = s.trim();
    let s = s.strip_prefix("D:").unwrap_or(s);
    if s.len() < 4 {
        return None;
    }

    let field = |range: std::ops::Range<usize>, default: u32| -> Option<u32> {
        match s.get(range) {
            Some(part) if part.bytes().all(|b| b.is_ascii_digit()) => part.parse().ok(),
            Some(_) => None,
            None => Some(default),
        }
    };

    let year = field(0..4, 0)? as i32;
    let month = field(4..6, 1)?;
    let day = field(6..8, 1)?;
    let hour = field(8..10, 0)?;
    let minute = field(10..12, 0)?;
    let second = field(12..14, 0)?;

    chrono::NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .map(|dt| chrono::DateTime::from_naive_utc_and_offset(dt, chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fixtures::{FixturePage, PdfFixture};
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_detect_version() {
        assert_eq!(detect_version(b"%PDF-1.7\n%\xe2\xe3").unwrap(), "1.7");
        assert_eq!(detect_version(b"%PDF-2.0\n").unwrap(), "2.0");
        assert_eq!(detect_version(b"junk\n%PDF-1.4\n").unwrap(), "1.4");
    }

    #[test]
    fn test_detect_rejects_non_pdf() {
        assert!(matches!(detect_version(b"<!DOCTYPE html>"), Err(Error::UnknownFormat)));
        assert!(matches!(detect_version(b"%PDF"), Err(Error::UnknownFormat)));
        assert!(matches!(detect_version(b"%PDF-x.y\n"), Err(Error::UnsupportedVersion(_))));
    }

    #[test]
    fn test_parse_pdf_date() {
        let date = parse_pdf_date("D:20240115103045+09'00'").unwrap();
        assert_eq!((date.year(), date.month(), date.day()), (2024, 1, 15));
        assert_eq!((date.hour(), date.minute(), date.second()), (10, 30, 45));

        let minimal = parse_pdf_date("D:2024").unwrap();
        assert_eq!((minimal.month(), minimal.day()), (1, 1));

        assert!(parse_pdf_date("D:20241399").is_none());
        assert!(parse_pdf_date("yesterday").is_none());
    }

    #[test]
    fn test_open_from_bytes_preloads_pages() {
        let bytes = PdfFixture::new()
            .page(FixturePage::new().text(72.0, 700.0, "Hello").text(72.0, 680.0, "World"))
            .page(FixturePage::new().line((50.0, 500.0), (300.0, 500.0)))
            .build();

        let doc = PdfDocument::from_bytes(bytes.clone()).unwrap();
        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.bytes(), bytes.as_slice());
        assert!(doc.path().exists());
        assert_eq!(doc.page_height(1), 792.0);

        let spans = doc.page_spans(1).unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].text, "Hello");

        assert!(doc.page_spans(2).unwrap().is_empty());
        let rulings = doc.page_rulings(2).unwrap();
        assert_eq!(rulings.len(), 1);
        assert_eq!(rulings[0].top, 292.0);

        assert!(matches!(doc.page_spans(3), Err(Error::PageOutOfRange(3, 2))));
        assert!(matches!(doc.page_spans(0), Err(Error::PageOutOfRange(0, 2))));
    }

    #[test]
    fn test_spill_file_removed_on_drop() {
        let bytes = PdfFixture::new().page(FixturePage::new().text(72.0, 700.0, "x")).build();
        let doc = PdfDocument::from_bytes(bytes).unwrap();
        let path = doc.path().to_path_buf();
        assert!(path.exists());
        drop(doc);
        assert!(!path.exists());
    }

    #[test]
    fn test_metadata_from_info_dictionary() {
        let bytes = PdfFixture::new()
            .page(FixturePage::new().text(72.0, 700.0, "Body"))
            .info("Title", "  Quarterly\n Report ")
            .info("Author", "Finance Team")
            .info("Keywords", "audit, finance")
            .info("CreationDate", "D:20230401120000Z")
            .build();
        let size = bytes.len() as u64;

        let doc = PdfDocument::from_bytes(bytes).unwrap();
        let metadata = doc.metadata();
        assert_eq!(metadata.title.as_deref(), Some("Quarterly Report"));
        assert_eq!(metadata.author.as_deref(), Some("Finance Team"));
        assert_eq!(metadata.keywords, vec!["audit", "finance"]);
        assert_eq!(metadata.created.map(|d| d.year()), Some(2023));
        assert_eq!(metadata.page_count, 1);
        assert_eq!(metadata.file_size, size);
        assert_eq!(metadata.pdf_version, "1.5");
        assert!(!metadata.encrypted);
    }

    #[test]
    fn test_open_file() {
        let bytes = PdfFixture::new().page(FixturePage::new().text(72.0, 700.0, "File")).build();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&bytes).unwrap();

        let doc = PdfDocument::open(file.path()).unwrap();
        assert_eq!(doc.path(), file.path());
        assert_eq!(doc.page_spans(1).unwrap()[0].text, "File");
    }

    #[test]
    fn test_open_rejects_garbage() {
        assert!(matches!(
            PdfDocument::from_bytes(b"not a pdf at all".to_vec()),
            Err(Error::UnknownFormat)
        ));
        assert!(PdfDocument::from_bytes(b"%PDF-1.4\ntruncated".to_vec()).is_err());
        assert!(matches!(
            PdfDocument::open("/nonexistent/input.pdf"),
            Err(Error::Io(_))
        ));
    }
}
