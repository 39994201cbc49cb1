//! Turning an accepted cell grid into typed columns.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::model::{CellValue, ColumnType};

use super::CellGrid;

/// Share of non-blank cells that must parse for a column to take a type.
const INFERENCE_THRESHOLD: f64 = 0.5;

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y", "%B %d, %Y", "%b %d, %Y", "%d %B %Y",
    "%d %b %Y",
];

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Cell text treated as missing in text columns.
const BLANK_MARKERS: &[&str] = &["nan", "none", "null"];

fn non_identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s-]").expect("valid regex"))
}

/// Header, typed rows and column types of a cleaned table.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CleanTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub column_types: Vec<ColumnType>,
}

/// Clean a grid whose first row is the header.
///
/// Returns `None` when nothing is left after dropping blank rows and columns.
pub(crate) fn clean_table(grid: &CellGrid) -> Option<CleanTable> {
    let (header_row, body) = grid.split_first()?;

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    let mut headers: Vec<Option<String>> = header_row.clone();
    headers.resize(width, None);

    let mut rows: Vec<Vec<String>> = body
        .iter()
        .map(|row| {
            let mut cells: Vec<String> = row
                .iter()
                .map(|c| c.as_deref().unwrap_or("").trim().to_string())
                .collect();
            cells.resize(width, String::new());
            cells
        })
        .filter(|row| row.iter().any(|c| !c.is_empty()))
        .collect();

    if rows.is_empty() {
        return None;
    }

    let keep: Vec<usize> = (0..width)
        .filter(|&col| rows.iter().any(|row| !row[col].is_empty()))
        .collect();
    if keep.is_empty() {
        return None;
    }

    let headers = sanitize_headers(keep.iter().map(|&col| (col, headers[col].as_deref())));
    for row in &mut rows {
        *row = keep.iter().map(|&col| std::mem::take(&mut row[col])).collect();
    }

    let mut columns: Vec<Vec<CellValue>> = Vec::with_capacity(keep.len());
    let mut column_types = Vec::with_capacity(keep.len());
    for col in 0..keep.len() {
        let cells: Vec<&str> = rows.iter().map(|row| row[col].as_str()).collect();
        let (column_type, values) = infer_column(&cells);
        column_types.push(column_type);
        columns.push(values);
    }

    let rows = (0..rows.len())
        .map(|r| columns.iter().map(|col| col[r].clone()).collect())
        .collect();

    Some(CleanTable {
        headers,
        rows,
        column_types,
    })
}

/// Sanitize header cells into unique identifiers.
///
/// `col` is the cell's position in the original grid, used for
/// placeholder names.
fn sanitize_headers<'a>(cells: impl Iterator<Item = (usize, Option<&'a str>)>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    cells
        .map(|(col, cell)| {
            let stripped = non_identifier().replace_all(cell.unwrap_or("").trim(), "");
            let name = stripped.split_whitespace().collect::<Vec<_>>().join("_");
            let name = if name.is_empty() {
                format!("Column_{}", col)
            } else {
                name
            };

            let count = seen.entry(name.clone()).or_insert(0);
            *count += 1;
            if *count == 1 {
                name
            } else {
                format!("{}_{}", name, count)
            }
        })
        .collect()
}

/// Infer a column type and convert its cells.
pub(crate) fn infer_column(cells: &[&str]) -> (ColumnType, Vec<CellValue>) {
    let filled = cells.iter().filter(|c| !c.is_empty()).count();
    let majority = |parsed: usize| filled > 0 && parsed as f64 / filled as f64 > INFERENCE_THRESHOLD;

    let numbers: Vec<Option<f64>> = cells.iter().map(|c| parse_number(c)).collect();
    if majority(numbers.iter().flatten().count()) {
        let integral = numbers
            .iter()
            .flatten()
            .all(|n| n.fract() == 0.0 && n.abs() < i64::MAX as f64);
        let values = numbers
            .into_iter()
            .map(|n| match n {
                Some(n) if integral => CellValue::Integer(n as i64),
                Some(n) => CellValue::Float(n),
                None => CellValue::Null,
            })
            .collect();
        let column_type = if integral {
            ColumnType::Integer
        } else {
            ColumnType::Float
        };
        return (column_type, values);
    }

    let dates: Vec<Option<CellValue>> = cells.iter().map(|c| parse_date(c)).collect();
    if majority(dates.iter().flatten().count()) {
        let values = dates
            .into_iter()
            .map(|d| d.unwrap_or(CellValue::Null))
            .collect();
        return (ColumnType::Date, values);
    }

    let values = cells
        .iter()
        .map(|c| {
            let text = if BLANK_MARKERS.contains(&c.to_ascii_lowercase().as_str()) {
                ""
            } else {
                c
            };
            CellValue::Text(text.to_string())
        })
        .collect();
    (ColumnType::Text, values)
}

/// Parse a numeric cell, allowing thousands separators.
fn parse_number(cell: &str) -> Option<f64> {
    if !cell.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    let cleaned: String = cell.chars().filter(|&c| c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn parse_date(cell: &str) -> Option<CellValue> {
    if cell.is_empty() {
        return None;
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(cell, f).ok())
        .map(CellValue::DateTime)
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(cell, f).ok())
                .map(CellValue::Date)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(rows: &[&[&str]]) -> CellGrid {
        rows.iter()
            .map(|row| {
                row.iter()
                    .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                    .collect()
            })
            .collect()
    }

    #[test]
    fn test_headers_sanitized() {
        let table = clean_table(&grid(&[
            &[" Unit Price ($) ", "", "Qty#", "Qty"],
            &["1.50", "a", "2", "3"],
        ]))
        .unwrap();
        assert_eq!(table.headers, vec!["Unit_Price", "Column_1", "Qty", "Qty_2"]);
    }

    #[test]
    fn test_blank_rows_and_columns_dropped() {
        let table = clean_table(&grid(&[
            &["Name", "Empty", "Score"],
            &["Alice", "", "90"],
            &["", "", ""],
            &["Bob", "", "85"],
        ]))
        .unwrap();
        assert_eq!(table.headers, vec!["Name", "Score"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.column_types, vec![ColumnType::Text, ColumnType::Integer]);
        assert_eq!(table.rows[1][1], CellValue::Integer(85));
    }

    #[test]
    fn test_header_only_is_discarded() {
        assert!(clean_table(&grid(&[&["A", "B"]])).is_none());
        assert!(clean_table(&grid(&[&["A", "B"], &["", ""]])).is_none());
        assert!(clean_table(&Vec::new()).is_none());
    }

    #[test]
    fn test_ragged_rows_padded() {
        let table = clean_table(&grid(&[&["A", "B"], &["x", "y", "z"], &["w"]])).unwrap();
        assert_eq!(table.headers, vec!["A", "B", "Column_2"]);
        assert_eq!(table.rows[1], vec![
            CellValue::Text("w".into()),
            CellValue::Text("".into()),
            CellValue::Text("".into()),
        ]);
    }

    #[test]
    fn test_numeric_inference() {
        let (kind, values) = infer_column(&["1", "2.5", "n/a", ""]);
        assert_eq!(kind, ColumnType::Float);
        assert_eq!(values[1], CellValue::Float(2.5));
        assert_eq!(values[2], CellValue::Null);
        assert_eq!(values[3], CellValue::Null);

        let (kind, values) = infer_column(&["1,200", "30", "-4"]);
        assert_eq!(kind, ColumnType::Integer);
        assert_eq!(values[0], CellValue::Integer(1200));
    }

    #[test]
    fn test_majority_is_strict() {
        // Exactly half numeric stays text
        let (kind, values) = infer_column(&["1", "two"]);
        assert_eq!(kind, ColumnType::Text);
        assert_eq!(values[0], CellValue::Text("1".into()));
    }

    #[test]
    fn test_date_inference() {
        let (kind, values) = infer_column(&["2024-01-15", "03/02/2023", "March 5, 2022", "soon"]);
        assert_eq!(kind, ColumnType::Date);
        assert_eq!(
            values[0],
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(
            values[1],
            CellValue::Date(NaiveDate::from_ymd_opt(2023, 3, 2).unwrap())
        );
        assert_eq!(values[3], CellValue::Null);

        let (kind, values) = infer_column(&["2024-01-15 10:30:00"]);
        assert_eq!(kind, ColumnType::Date);
        assert!(matches!(values[0], CellValue::DateTime(_)));
    }

    #[test]
    fn test_text_blank_markers() {
        let (kind, values) = infer_column(&["alpha", "NaN", "None", "beta"]);
        assert_eq!(kind, ColumnType::Text);
        assert_eq!(values[1], CellValue::Text("".into()));
        assert_eq!(values[2], CellValue::Text("".into()));
        assert_eq!(values[3], CellValue::Text("beta".into()));
    }
}
