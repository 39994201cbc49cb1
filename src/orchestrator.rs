//! End-to-end extraction runs.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::extract::{ImageHarvester, TableDetector, TextExtractionChain};
use crate::model::{ExtractionResult, ExtractionStats};
use crate::ocr::{OcrEngine, PdftoppmRasterizer, Rasterizer, TesseractEngine};
use crate::options::ExtractOptions;
use crate::parser::{PageSource, PdfDocument};
use crate::progress::{ProgressSink, ProgressTracker, Stage};

/// Runs text, table and image extraction over a document.
///
/// # Example
///
/// ```no_run
/// use pdfharvest::{ExtractOptions, ExtractionOrchestrator, LogSink};
///
/// let orchestrator = ExtractionOrchestrator::new(ExtractOptions::default().with_workers(4));
/// let result = orchestrator.run("report.pdf", Some(&LogSink))?;
/// println!("{} tables, {} images", result.tables.len(), result.images.len());
/// # Ok::<(), pdfharvest::Error>(())
/// ```
#[derive(Clone)]
pub struct ExtractionOrchestrator {
    options: ExtractOptions,
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn Rasterizer>,
}

impl ExtractionOrchestrator {
    /// Create an orchestrator using `tesseract` and `pdftoppm`.
    pub fn new(options: ExtractOptions) -> Self {
        let ocr = Arc::new(TesseractEngine::new(options.text.language.clone()));
        Self {
            options,
            ocr,
            rasterizer: Arc::new(PdftoppmRasterizer::new()),
        }
    }

    /// Use a different OCR engine.
    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self
    }

    /// Use a different page rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    /// Extract everything from the PDF at `path`.
    ///
    /// Fatal errors are reported to `sink` with a failed status and
    /// returned; no partial result is produced.
    pub fn run(&self, path: impl AsRef<Path>, sink: Option<&dyn ProgressSink>) -> Result<ExtractionResult> {
        let path = path.as_ref();
        let tracker = ProgressTracker::new(sink);
        let started = Instant::now();

        tracker.begin(Stage::Open, format!("Opening {}", path.display()));
        let document = self.open(&tracker, || PdfDocument::open(path))?;
        self.execute(&document, &tracker, started)
    }

    /// Extract everything from an in-memory PDF.
    pub fn run_bytes(&self, data: Vec<u8>, sink: Option<&dyn ProgressSink>) -> Result<ExtractionResult> {
        let tracker = ProgressTracker::new(sink);
        let started = Instant::now();

        tracker.begin(Stage::Open, format!("Opening {} bytes", data.len()));
        let document = self.open(&tracker, || PdfDocument::from_bytes(data))?;
        self.execute(&document, &tracker, started)
    }

    /// Extract everything from an already opened page source.
    pub fn run_source(&self, source: &dyn PageSource, sink: Option<&dyn ProgressSink>) -> Result<ExtractionResult> {
        let tracker = ProgressTracker::new(sink);
        let started = Instant::now();

        tracker.begin(Stage::Open, "Using opened document");
        self.options
            .validate()
            .map_err(|e| tracker.fail(Stage::Open, e))?;
        self.execute(source, &tracker, started)
    }

    /// Run [`run`](Self::run) on tokio's blocking pool.
    #[cfg(feature = "async")]
    pub async fn run_async(
        &self,
        path: impl AsRef<Path>,
        sink: Option<Arc<dyn ProgressSink>>,
    ) -> Result<ExtractionResult> {
        let orchestrator = self.clone();
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || orchestrator.run(&path, sink.as_deref()))
            .await
            .map_err(|e| Error::Other(format!("extraction task failed: {}", e)))?
    }

    fn open(&self, tracker: &ProgressTracker<'_>, open: impl FnOnce() -> Result<PdfDocument>) -> Result<PdfDocument> {
        let document = self
            .options
            .validate()
            .and_then(|_| open().map_err(|e| Error::DocumentOpen(Box::new(e))))
            .map_err(|e| tracker.fail(Stage::Open, e))?;
        tracker.finish(Stage::Open, format!("Opened document with {} pages", document.page_count()));
        Ok(document)
    }

    fn execute(&self, source: &dyn PageSource, tracker: &ProgressTracker<'_>, started: Instant) -> Result<ExtractionResult> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.workers)
            .build()
            .map_err(|e| tracker.fail(Stage::Open, Error::Other(format!("cannot start worker pool: {}", e))))?;

        pool.install(|| self.extract(source, tracker, started))
    }

    fn extract(&self, source: &dyn PageSource, tracker: &ProgressTracker<'_>, started: Instant) -> Result<ExtractionResult> {
        let page_count = source.page_count();

        tracker.begin(Stage::Text, "Extracting text");
        let chain = TextExtractionChain::new(&self.options.text, self.ocr.clone(), self.rasterizer.clone());
        let text = chain.extract(source).map_err(|e| tracker.fail(Stage::Text, e))?;
        tracker.finish(Stage::Text, format!("Text extracted with '{}'", text.backend));

        tracker.begin(Stage::Tables, format!("Detecting tables on {} pages", page_count));
        let detector = TableDetector::new(self.options.table.clone(), self.ocr.clone(), self.rasterizer.clone());
        let tables = detector.extract_with_progress(source, &|page| tracker.page_done(Stage::Tables, page, page_count));
        tracker.finish(Stage::Tables, format!("Found {} tables", tables.tables.len()));

        tracker.begin(Stage::Images, format!("Harvesting images from {} pages", page_count));
        let harvester = ImageHarvester::new(self.options.image.clone(), self.rasterizer.clone());
        let images = harvester.extract_with_progress(source, &|page| tracker.page_done(Stage::Images, page, page_count));
        tracker.finish(Stage::Images, format!("Kept {} images", images.images.len()));

        tracker.begin(Stage::Finalize, "Merging results");
        let mut stats = ExtractionStats {
            page_count,
            ..Default::default()
        };
        stats.merge(&tables.stats);
        stats.merge(&images.stats);
        stats.elapsed_ms = started.elapsed().as_millis() as u64;

        let result = ExtractionResult {
            text: text.text,
            text_backend: text.backend,
            pages_without_text: text.pages_without_text,
            tables: tables.tables,
            images: images.images,
            metadata: source.metadata().clone(),
            stats,
        };

        log::info!(
            "Extraction finished in {} ms: {} pages, {} tables, {} images, {} failed pages",
            result.stats.elapsed_ms,
            page_count,
            result.tables.len(),
            result.images.len(),
            result.stats.failed_pages
        );
        tracker.complete("Extraction complete");
        Ok(result)
    }
}

impl std::fmt::Debug for ExtractionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionOrchestrator")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
