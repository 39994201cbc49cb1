//! Table detection.
//!
//! Each page runs every configured geometric strategy. Their candidates
//! are merged and deduplicated by exact cell content, checked against the
//! validity predicate and cleaned into typed [`TableRecord`]s. A page on
//! which no strategy finds anything is rasterized and its OCR text is
//! split into candidates instead.

mod clean;
mod lattice;
mod ocr;
mod stream;

use std::collections::HashSet;
use std::sync::Arc;

use rayon::prelude::*;

use crate::error::{Error, Result};
use crate::model::{ExtractionStats, TableRecord, TableSource};
use crate::ocr::{OcrEngine, Rasterizer};
use crate::options::{TableOptions, TableStrategyKind};
use crate::parser::{PageSource, Ruling, TextSpan};

pub(crate) use clean::clean_table;
pub use lattice::LatticeStrategy;
pub use stream::{StreamConfig, StreamStrategy};

/// Raw table matrix; `None` marks a cell with no content.
pub type CellGrid = Vec<Vec<Option<String>>>;

/// Geometry of one page as seen by the strategies.
#[derive(Debug, Clone, Copy)]
pub struct PageGeometry<'a> {
    pub page: u32,
    pub spans: &'a [TextSpan],
    pub rulings: &'a [Ruling],
    pub height: f32,
}

/// A geometric table detection strategy.
pub trait TableStrategy: Send + Sync {
    /// Short identifier recorded as the table's source.
    fn name(&self) -> &'static str;

    /// Table grids on the page, in detection order.
    fn find_tables(&self, page: &PageGeometry<'_>) -> Result<Vec<CellGrid>>;
}

/// Build the strategy for a configured kind.
pub fn strategy_for(kind: TableStrategyKind) -> Box<dyn TableStrategy> {
    match kind {
        TableStrategyKind::Default => Box::new(LatticeStrategy::standard()),
        TableStrategyKind::Text => Box::new(StreamStrategy::default()),
        TableStrategyKind::Lines => Box::new(LatticeStrategy::lines()),
    }
}

/// Why a candidate failed the validity predicate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    /// Fewer rows than the configured minimum
    TooFewRows(usize),
    /// Some row has fewer cells than the configured minimum
    TooFewColumns(usize),
    /// Empty-cell ratio at or above the configured maximum
    TooSparse(f64),
}

/// Check the validity predicate, returning the empty-cell ratio.
pub fn validate_grid(grid: &CellGrid, options: &TableOptions) -> std::result::Result<f64, Rejection> {
    if grid.len() < options.min_rows {
        return Err(Rejection::TooFewRows(grid.len()));
    }
    if let Some(short) = grid.iter().map(Vec::len).find(|&n| n < options.min_columns) {
        return Err(Rejection::TooFewColumns(short));
    }

    let total: usize = grid.iter().map(Vec::len).sum();
    let empty = grid
        .iter()
        .flatten()
        .filter(|cell| cell.as_deref().map_or(true, |c| c.trim().is_empty()))
        .count();
    if total == 0 {
        return Err(Rejection::TooSparse(1.0));
    }

    let ratio = empty as f64 / total as f64;
    if ratio < options.max_empty_ratio {
        Ok(ratio)
    } else {
        Err(Rejection::TooSparse(ratio))
    }
}

/// Tables of a whole document with detection statistics.
#[derive(Debug, Clone, Default)]
pub struct TableReport {
    /// Accepted tables, ordered by page, then index
    pub tables: Vec<TableRecord>,
    pub stats: ExtractionStats,
}

#[derive(Debug)]
struct Candidate {
    grid: CellGrid,
    source: TableSource,
}

#[derive(Debug, Default)]
struct PageTables {
    tables: Vec<TableRecord>,
    candidates: u32,
    ocr_fallback: bool,
}

/// Multi-strategy table detector.
pub struct TableDetector {
    options: TableOptions,
    strategies: Vec<Box<dyn TableStrategy>>,
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn Rasterizer>,
}

impl TableDetector {
    /// Create a detector running the strategies named in `options`.
    pub fn new(
        options: TableOptions,
        ocr: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> Self {
        let strategies = options.strategies.iter().map(|&k| strategy_for(k)).collect();
        Self {
            options,
            strategies,
            ocr,
            rasterizer,
        }
    }

    /// Replace the strategies, keeping the rest of the configuration.
    pub fn with_strategies(mut self, strategies: Vec<Box<dyn TableStrategy>>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// Detect tables on every page.
    pub fn extract(&self, source: &dyn PageSource) -> TableReport {
        self.extract_with_progress(source, &|_| {})
    }

    /// Detect tables on every page, calling `on_page` as each page finishes.
    ///
    /// Pages are processed in parallel on the current rayon pool. A page
    /// that fails contributes no tables and is counted in
    /// `stats.failed_pages`.
    pub fn extract_with_progress(
        &self,
        source: &dyn PageSource,
        on_page: &(dyn Fn(u32) + Sync),
    ) -> TableReport {
        let pages: Vec<u32> = source.pages().collect();
        let outcomes: Vec<(u32, Result<PageTables>)> = pages
            .par_iter()
            .map(|&page| {
                let outcome = self.process_page(source, page);
                on_page(page);
                (page, outcome)
            })
            .collect();

        let mut report = TableReport::default();
        report.stats.page_count = source.page_count();
        for (page, outcome) in outcomes {
            match outcome {
                Ok(found) => {
                    let accepted = found.tables.len() as u32;
                    report.stats.table_candidates += found.candidates;
                    report.stats.tables_accepted += accepted;
                    report.stats.tables_rejected += found.candidates - accepted;
                    report.stats.ocr_fallback_pages += u32::from(found.ocr_fallback);
                    report.tables.extend(found.tables);
                }
                Err(e) => {
                    log::warn!("Page {}: table detection failed: {}", page, e);
                    report.stats.failed_pages += 1;
                }
            }
        }

        log::info!(
            "Accepted {} of {} table candidates",
            report.stats.tables_accepted,
            report.stats.table_candidates
        );
        report
    }

    /// Detect tables on a single page.
    pub fn detect_page(&self, source: &dyn PageSource, page: u32) -> Result<Vec<TableRecord>> {
        self.process_page(source, page).map(|found| found.tables)
    }

    fn process_page(&self, source: &dyn PageSource, page: u32) -> Result<PageTables> {
        if page == 0 || page > source.page_count() {
            return Err(Error::PageOutOfRange(page, source.page_count()));
        }

        let mut candidates = self.structural_candidates(source, page);
        let mut ocr_fallback = false;
        if candidates.is_empty() && self.options.ocr_fallback {
            log::debug!("Page {}: no structural candidates, trying OCR", page);
            candidates = self.ocr_candidates(source, page)?;
            ocr_fallback = true;
        }

        let mut tables = Vec::new();
        for candidate in &candidates {
            let empty_ratio = match validate_grid(&candidate.grid, &self.options) {
                Ok(ratio) => ratio,
                Err(reason) => {
                    log::debug!("Page {}: rejected candidate: {:?}", page, reason);
                    continue;
                }
            };
            match self.build_record(page, tables.len(), candidate, empty_ratio) {
                Some(record) => tables.push(record),
                None => log::debug!("Page {}: candidate empty after cleaning", page),
            }
        }

        Ok(PageTables {
            tables,
            candidates: candidates.len() as u32,
            ocr_fallback,
        })
    }

    /// Run every strategy and drop exact repeats.
    fn structural_candidates(&self, source: &dyn PageSource, page: u32) -> Vec<Candidate> {
        let spans = source.page_spans(page).unwrap_or_else(|e| {
            log::debug!("Page {}: no spans for table detection: {}", page, e);
            &[]
        });
        let rulings = source.page_rulings(page).unwrap_or_else(|e| {
            log::debug!("Page {}: no rulings for table detection: {}", page, e);
            &[]
        });
        let geometry = PageGeometry {
            page,
            spans,
            rulings,
            height: source.page_height(page),
        };

        let mut seen = HashSet::new();
        let mut candidates = Vec::new();
        for strategy in &self.strategies {
            let grids = match strategy.find_tables(&geometry) {
                Ok(grids) => grids,
                Err(e) => {
                    log::debug!("Page {}: strategy '{}' failed: {}", page, strategy.name(), e);
                    continue;
                }
            };
            for grid in grids {
                if grid.is_empty() || !seen.insert(format!("{:?}", grid)) {
                    continue;
                }
                candidates.push(Candidate {
                    grid,
                    source: TableSource::Structural(strategy.name()),
                });
            }
        }
        candidates
    }

    fn ocr_candidates(&self, source: &dyn PageSource, page: u32) -> Result<Vec<Candidate>> {
        let image = self
            .rasterizer
            .rasterize(source.path(), page, self.options.ocr_dpi)
            .map_err(|e| Error::page(page, "table OCR", e))?;
        let text = self
            .ocr
            .recognize(&image)
            .map_err(|e| Error::page(page, "table OCR", e))?;

        Ok(ocr::partition_ocr_text(&text)
            .into_iter()
            .map(|grid| Candidate {
                grid,
                source: TableSource::Ocr,
            })
            .collect())
    }

    fn build_record(
        &self,
        page: u32,
        table_index: usize,
        candidate: &Candidate,
        empty_ratio: f64,
    ) -> Option<TableRecord> {
        let cleaned = clean_table(&candidate.grid)?;
        Some(TableRecord {
            page_number: page,
            table_index,
            description: TableRecord::describe(cleaned.rows.len(), cleaned.headers.len()),
            headers: cleaned.headers,
            rows: cleaned.rows,
            column_types: cleaned.column_types,
            source: candidate.source,
            empty_ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::{MockOcr, MockPage, MockRasterizer, MockSource};
    use crate::model::CellValue;

    fn grid(rows: &[&[&str]]) -> CellGrid {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                    .collect()
            })
            .collect()
    }

    /// Strategy returning the same grids on every page.
    struct Fixed(&'static str, Vec<CellGrid>);

    impl TableStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }

        fn find_tables(&self, _page: &PageGeometry<'_>) -> Result<Vec<CellGrid>> {
            Ok(self.1.clone())
        }
    }

    struct Broken;

    impl TableStrategy for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn find_tables(&self, page: &PageGeometry<'_>) -> Result<Vec<CellGrid>> {
            Err(Error::page(page.page, "table strategy", "malformed geometry"))
        }
    }

    fn detector(ocr: Arc<MockOcr>, rasterizer: Arc<MockRasterizer>) -> TableDetector {
        TableDetector::new(TableOptions::default(), ocr, rasterizer)
    }

    fn sample_grid() -> CellGrid {
        grid(&[&["Name", "Qty"], &["Bolt", "4"], &["Nut", "9"]])
    }

    #[test]
    fn test_validity_predicate() {
        let options = TableOptions::default();

        assert_eq!(
            validate_grid(&grid(&[&["a", "b", "c"]]), &options),
            Err(Rejection::TooFewRows(1))
        );
        assert_eq!(
            validate_grid(&grid(&[&["a", "b"], &["c"]]), &options),
            Err(Rejection::TooFewColumns(1))
        );

        // 3 rows x 2 columns: 2 of 6 empty passes, 3 and 4 of 6 fail
        let sparse_ok = grid(&[&["a", ""], &["", "b"], &["c", "d"]]);
        assert!((validate_grid(&sparse_ok, &options).unwrap() - 2.0 / 6.0).abs() < 1e-9);
        let half = grid(&[&["a", ""], &["", "b"], &["c", ""]]);
        assert_eq!(validate_grid(&half, &options), Err(Rejection::TooSparse(0.5)));
        let mostly_empty = grid(&[&["a", ""], &["", ""], &["", "d"]]);
        assert!(matches!(validate_grid(&mostly_empty, &options), Err(Rejection::TooSparse(_))));

        // 5 rows x 2 columns gives exact 40% and 60%
        let forty = grid(&[&["a", ""], &["b", ""], &["c", ""], &["d", ""], &["e", "f"]]);
        assert!((validate_grid(&forty, &options).unwrap() - 0.4).abs() < 1e-9);
        let sixty = grid(&[&["a", ""], &["b", ""], &["c", ""], &["", ""], &["e", ""]]);
        assert!(matches!(validate_grid(&sixty, &options), Err(Rejection::TooSparse(_))));
    }

    #[test]
    fn test_whitespace_cells_count_as_empty() {
        let options = TableOptions::default().with_max_empty_ratio(0.3);
        let g = vec![
            vec![Some("a".to_string()), Some("  ".to_string())],
            vec![Some("b".to_string()), Some("c".to_string())],
        ];
        assert_eq!(validate_grid(&g, &options), Ok(0.25));
    }

    #[test]
    fn test_duplicate_candidates_merged() {
        let source = MockSource::blank(1);
        let det = detector(Arc::new(MockOcr::default()), Arc::new(MockRasterizer::default()))
            .with_strategies(vec![
                Box::new(Fixed("default", vec![sample_grid()])),
                Box::new(Fixed("text", vec![sample_grid(), Vec::new()])),
            ]);

        let report = det.extract(&source);
        assert_eq!(report.stats.table_candidates, 1);
        assert_eq!(report.tables.len(), 1);

        let table = &report.tables[0];
        assert_eq!(table.source, TableSource::Structural("default"));
        assert_eq!(table.headers, vec!["Name", "Qty"]);
        assert_eq!(table.get(1, "Qty"), Some(&CellValue::Integer(9)));
        assert_eq!(table.description, "Table with 2 rows and 2 columns");
    }

    #[test]
    fn test_rejected_candidate_blocks_ocr_fallback() {
        let ocr = Arc::new(MockOcr::default().with_page(1, "a b\nc d\n"));
        let rasterizer = Arc::new(MockRasterizer::default());
        let det = detector(ocr.clone(), rasterizer.clone())
            .with_strategies(vec![Box::new(Fixed("text", vec![grid(&[&["only", "row"]])]))]);

        let report = det.extract(&MockSource::blank(1));
        assert!(report.tables.is_empty());
        assert_eq!(report.stats.table_candidates, 1);
        assert_eq!(report.stats.tables_rejected, 1);
        assert_eq!(report.stats.ocr_fallback_pages, 0);
        assert_eq!(ocr.calls(), 0);
        assert_eq!(rasterizer.calls(), 0);
    }

    #[test]
    fn test_ocr_fallback_on_empty_page() {
        let ocr = Arc::new(
            MockOcr::default().with_page(2, "Item Qty\nBolt 4\nNut 9\nNotes\nfree text\n"),
        );
        let rasterizer = Arc::new(MockRasterizer::default());
        let det = detector(ocr.clone(), rasterizer.clone()).with_strategies(vec![
            Box::new(Broken),
            Box::new(Fixed("text", Vec::new())),
        ]);

        let report = det.extract(&MockSource::blank(2));
        assert_eq!(ocr.calls(), 2);
        assert_eq!(report.stats.ocr_fallback_pages, 2);
        assert_eq!(report.tables.len(), 1);

        let table = &report.tables[0];
        assert_eq!(table.page_number, 2);
        assert_eq!(table.table_index, 0);
        assert_eq!(table.source, TableSource::Ocr);
        assert_eq!(table.headers, vec!["Item", "Qty"]);
        assert_eq!(table.row_count(), 2);
        // "free text" alone is a single row and fails the row minimum
        assert_eq!(report.stats.tables_rejected, 1);
    }

    #[test]
    fn test_ocr_fallback_disabled() {
        let ocr = Arc::new(MockOcr::default().with_page(1, "a b\nc d\n"));
        let det = TableDetector::new(
            TableOptions::default().with_ocr_fallback(false),
            ocr.clone(),
            Arc::new(MockRasterizer::default()),
        );
        let report = det.extract(&MockSource::blank(1));
        assert!(report.tables.is_empty());
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn test_failed_page_isolated() {
        let ocr = Arc::new(MockOcr::default().with_page(2, "A B\n1 2\n3 4\n"));
        let rasterizer = Arc::new(MockRasterizer::default().failing_on(1));
        let det = detector(ocr, rasterizer).with_strategies(Vec::new());

        let report = det.extract(&MockSource::blank(2));
        assert_eq!(report.stats.failed_pages, 1);
        assert_eq!(report.tables.len(), 1);
        assert_eq!(report.tables[0].page_number, 2);
    }

    #[test]
    fn test_tables_ordered_by_page_and_index() {
        let det = detector(Arc::new(MockOcr::default()), Arc::new(MockRasterizer::default()))
            .with_strategies(vec![Box::new(Fixed(
                "text",
                vec![
                    sample_grid(),
                    grid(&[&["x"]]),
                    grid(&[&["A", "B"], &["1", "2"], &["3", "4"]]),
                ],
            ))]);

        let report = det.extract(&MockSource::blank(3));
        let keys: Vec<(u32, usize)> = report
            .tables
            .iter()
            .map(|t| (t.page_number, t.table_index))
            .collect();
        assert_eq!(keys, vec![(1, 0), (1, 1), (2, 0), (2, 1), (3, 0), (3, 1)]);
        assert_eq!(report.stats.tables_rejected, 3);
    }

    #[test]
    fn test_stream_strategy_on_page_spans() {
        let spans = vec![
            TextSpan::new("Name".into(), 72.0, 700.0, 12.0, "F1".into()),
            TextSpan::new("Score".into(), 200.0, 700.0, 12.0, "F1".into()),
            TextSpan::new("Alice".into(), 72.0, 685.0, 12.0, "F1".into()),
            TextSpan::new("90".into(), 200.0, 685.0, 12.0, "F1".into()),
            TextSpan::new("Bob".into(), 72.0, 670.0, 12.0, "F1".into()),
            TextSpan::new("85".into(), 200.0, 670.0, 12.0, "F1".into()),
        ];
        let source = MockSource::new(vec![MockPage::with_spans(spans)]);
        let det = detector(Arc::new(MockOcr::default()), Arc::new(MockRasterizer::default()));

        let tables = det.detect_page(&source, 1).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].source, TableSource::Structural("text"));
        assert_eq!(tables[0].get(0, "Score"), Some(&CellValue::Integer(90)));
        assert!(det.detect_page(&source, 2).is_err());
    }
}
