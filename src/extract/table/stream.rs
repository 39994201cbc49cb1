//! Text-alignment table strategy.
//!
//! Finds tables without graphical lines by looking for runs of rows whose
//! span start positions line up in at least two columns.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::parser::TextSpan;

use super::{CellGrid, PageGeometry, TableStrategy};

/// X positions within this many points share a column bucket.
const BUCKET_SIZE: f32 = 5.0;

/// Tolerance for a span start to count as aligned with a column.
const ALIGN_TOLERANCE: f32 = 5.0;

/// Tuning for the alignment strategy.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Minimum number of rows in a region
    pub min_rows: usize,
    /// Minimum number of aligned columns
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Y tolerance for grouping spans into rows (fraction of font size)
    pub y_tolerance_factor: f32,
    /// Minimum column alignment ratio (0.0-1.0)
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (points)
    pub min_column_gap: f32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            y_tolerance_factor: 0.4,
            min_alignment_ratio: 0.3,
            min_column_gap: 15.0,
        }
    }
}

/// A row of spans sharing a baseline.
#[derive(Debug, Clone)]
struct SpanRow<'a> {
    spans: Vec<&'a TextSpan>,
}

/// Detects tables from text alignment alone.
#[derive(Debug, Clone, Default)]
pub struct StreamStrategy {
    config: StreamConfig,
}

impl StreamStrategy {
    pub fn with_config(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Detect table grids in the given spans, top to bottom.
    pub fn detect(&self, spans: &[TextSpan]) -> Vec<CellGrid> {
        if spans.len() < self.config.min_rows * self.config.min_columns {
            return vec![];
        }

        let rows = self.group_into_rows(spans);
        if rows.len() < self.config.min_rows {
            return vec![];
        }

        let columns = self.detect_columns(&rows);
        if columns.len() < self.config.min_columns {
            log::debug!("Stream: only {} aligned columns", columns.len());
            return vec![];
        }

        let mut grids = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let region = &rows[start..=end];

            // Columns are re-detected per region so unrelated text does not vote
            let region_columns = self.detect_columns(region);
            if region_columns.len() < self.config.min_columns {
                continue;
            }
            if region_columns.len() > self.config.max_columns {
                log::debug!(
                    "Stream: skipping region, too many columns ({} > {})",
                    region_columns.len(),
                    self.config.max_columns
                );
                continue;
            }
            if self.is_list_pattern(region, &region_columns) {
                log::debug!("Stream: skipping region, detected as list pattern");
                continue;
            }

            grids.push(self.to_grid(region, &region_columns));
        }
        grids
    }

    /// Group spans into rows by baseline, top of the page first.
    fn group_into_rows<'a>(&self, spans: &'a [TextSpan]) -> Vec<SpanRow<'a>> {
        let mut sorted: Vec<&TextSpan> = spans.iter().collect();
        sorted.sort_by(|a, b| {
            b.y.partial_cmp(&a.y)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });

        let mut rows: Vec<SpanRow<'a>> = Vec::new();
        let mut current: Vec<&TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in sorted {
            let tolerance = span.font_size * self.config.y_tolerance_factor;
            match current_y {
                Some(y) if (span.y - y).abs() <= tolerance => current.push(span),
                _ => {
                    if !current.is_empty() {
                        rows.push(SpanRow {
                            spans: std::mem::take(&mut current),
                        });
                    }
                    current_y = Some(span.y);
                    current.push(span);
                }
            }
        }
        if !current.is_empty() {
            rows.push(SpanRow { spans: current });
        }

        rows
    }

    /// Column start positions shared by enough rows.
    ///
    /// Rows with several spans are the best evidence; when too few exist
    /// every span votes instead.
    fn detect_columns(&self, rows: &[SpanRow<'_>]) -> Vec<f32> {
        let multi: Vec<&SpanRow<'_>> = rows.iter().filter(|r| r.spans.len() >= 2).collect();

        let mut edge_counts: HashMap<i32, usize> = HashMap::new();
        let voters = if multi.len() >= self.config.min_rows {
            for row in &multi {
                let buckets: HashSet<i32> = row.spans.iter().map(|s| bucket(s.x)).collect();
                for b in buckets {
                    *edge_counts.entry(b).or_insert(0) += 1;
                }
            }
            multi.len()
        } else {
            for span in rows.iter().flat_map(|r| r.spans.iter()) {
                *edge_counts.entry(bucket(span.x)).or_insert(0) += 1;
            }
            rows.len()
        };

        let min_occurrences =
            ((voters as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<f32> = edge_counts
            .into_iter()
            .filter(|(_, count)| *count >= min_occurrences)
            .map(|(b, _)| b as f32 * BUCKET_SIZE)
            .collect();
        edges.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mut merged: Vec<f32> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    /// Contiguous runs of well-aligned rows.
    fn find_table_regions(&self, rows: &[SpanRow<'_>], columns: &[f32]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if alignment_score(row, columns) >= self.config.min_alignment_ratio {
                start.get_or_insert(i);
            } else if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }

        regions
    }

    fn to_grid(&self, rows: &[SpanRow<'_>], columns: &[f32]) -> CellGrid {
        let right_x = rows
            .iter()
            .flat_map(|r| r.spans.iter())
            .map(|s| s.x + s.width)
            .fold(f32::MIN, f32::max);

        rows.iter()
            .map(|row| {
                let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
                for span in &row.spans {
                    let col = find_column_for_span(span.x, columns, right_x);
                    let text = span.text.trim();
                    if !text.is_empty() {
                        cells[col].push(text);
                    }
                }
                cells
                    .into_iter()
                    .map(|parts| (!parts.is_empty()).then(|| parts.join(" ")))
                    .collect()
            })
            .collect()
    }

    /// Whether the region is really a bulleted or numbered list.
    ///
    /// List markers often land in their own span at a fixed X, which looks
    /// like a two-column table.
    fn is_list_pattern(&self, rows: &[SpanRow<'_>], columns: &[f32]) -> bool {
        if columns.len() < 2 || rows.is_empty() {
            return false;
        }

        let mut bullets = 0;
        let mut numbers = 0;
        for row in rows {
            let first = row
                .spans
                .iter()
                .min_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(span) = first {
                let text = span.text.trim();
                if is_bullet_marker(text) {
                    bullets += 1;
                } else if is_number_marker(text) {
                    numbers += 1;
                }
            }
        }

        let bullet_ratio = bullets as f32 / rows.len() as f32;
        let marker_ratio = (bullets + numbers) as f32 / rows.len() as f32;

        // Numbered first columns are common in real tables, so numbers
        // only disqualify two-column regions
        bullet_ratio >= 0.5 || (columns.len() == 2 && marker_ratio >= 0.5)
    }
}

impl TableStrategy for StreamStrategy {
    fn name(&self) -> &'static str {
        "text"
    }

    fn find_tables(&self, page: &PageGeometry<'_>) -> Result<Vec<CellGrid>> {
        Ok(self.detect(page.spans))
    }
}

fn bucket(x: f32) -> i32 {
    (x / BUCKET_SIZE).round() as i32
}

fn alignment_score(row: &SpanRow<'_>, columns: &[f32]) -> f32 {
    if row.spans.is_empty() || columns.is_empty() {
        return 0.0;
    }
    let aligned = row
        .spans
        .iter()
        .filter(|s| columns.iter().any(|c| (s.x - c).abs() <= ALIGN_TOLERANCE))
        .count();
    aligned as f32 / row.spans.len() as f32
}

/// Column index for a span starting at `x`.
///
/// A span belongs to the column whose start it follows (with 10pt of
/// slack); anything else goes to the nearest column start.
fn find_column_for_span(x: f32, columns: &[f32], right_x: f32) -> usize {
    for (i, &start) in columns.iter().enumerate() {
        let end = columns.get(i + 1).copied().unwrap_or(right_x + 100.0);
        if x >= start - 10.0 && x < end - 10.0 {
            return i;
        }
    }

    columns
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            (x - **a)
                .abs()
                .partial_cmp(&(x - **b).abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn is_bullet_marker(text: &str) -> bool {
    matches!(
        text.trim(),
        "-" | "–" | "—" | "•" | "·" | "*" | "○" | "▪" | "◦" | "▸" | "►" | "■" | "●" | "□" | "◆" | "▶" | "➤"
    )
}

/// Number-style list marker: `1.`, `12)`, bare `3`, `a.` or `B)`.
fn is_number_marker(text: &str) -> bool {
    let cleaned: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return false;
    }

    if let Some(pos) = cleaned.find(|c: char| !c.is_ascii_digit()) {
        let (digits, suffix) = cleaned.split_at(pos);
        if !digits.is_empty() && (suffix == "." || suffix == ")") {
            return true;
        }
    }
    if cleaned.parse::<u32>().is_ok() {
        return true;
    }

    let chars: Vec<char> = cleaned.chars().collect();
    chars.len() == 2 && chars[0].is_alphabetic() && matches!(chars[1], '.' | ')')
}
