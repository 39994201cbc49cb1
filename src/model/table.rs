//! Table record types.

use chrono::{NaiveDate, NaiveDateTime};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};

/// A typed table cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Blank or unparseable cell in a typed column
    Null,
    Integer(i64),
    Float(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Text(String),
}

impl CellValue {
    /// Check if the value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Get the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get the value as a float (integers widen).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Inferred type of a table column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Date,
    Text,
}

/// How a table was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "strategy", rename_all = "lowercase")]
pub enum TableSource {
    /// Found by a geometric strategy (named)
    Structural(&'static str),
    /// Recovered from OCR text of a rasterized page
    Ocr,
}

/// A validated, cleaned table.
///
/// Rows serialize as objects keyed by header, in header order.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRecord {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Zero-based index among accepted tables on the page
    pub table_index: usize,

    /// Sanitized column identifiers
    pub headers: Vec<String>,

    /// Row values, aligned with `headers`
    pub rows: Vec<Vec<CellValue>>,

    /// Inferred type of each column
    pub column_types: Vec<ColumnType>,

    /// One-line summary
    pub description: String,

    /// Detection provenance
    pub source: TableSource,

    /// Fraction of empty cells in the accepted candidate
    pub empty_ratio: f64,
}

impl TableRecord {
    /// Get the number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of columns.
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    /// Look up a cell by row index and header name.
    pub fn get(&self, row: usize, header: &str) -> Option<&CellValue> {
        let col = self.headers.iter().position(|h| h == header)?;
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Default description for a table of the given shape.
    pub fn describe(rows: usize, columns: usize) -> String {
        format!("Table with {} rows and {} columns", rows, columns)
    }
}

struct RowMap<'a> {
    headers: &'a [String],
    values: &'a [CellValue],
}

impl Serialize for RowMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (header, value) in self.headers.iter().zip(self.values) {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

struct Rows<'a>(&'a TableRecord);

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.rows.iter().map(|values| RowMap {
            headers: &self.0.headers,
            values,
        }))
    }
}

impl Serialize for TableRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TableRecord", 10)?;
        state.serialize_field("page_number", &self.page_number)?;
        state.serialize_field("table_index", &self.table_index)?;
        state.serialize_field("headers", &self.headers)?;
        state.serialize_field("data", &Rows(self))?;
        state.serialize_field("rows", &self.row_count())?;
        state.serialize_field("columns", &self.column_count())?;
        state.serialize_field("column_types", &self.column_types)?;
        state.serialize_field("description", &self.description)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("empty_ratio", &self.empty_ratio)?;
        state.end()
    }
}
