//! Recovering table candidates from OCR text.

use super::CellGrid;

/// Split recognized page text into row groups.
///
/// Each line becomes a row of whitespace-separated tokens. A blank line or
/// a line holding a single token closes the current group; that line is
/// not part of any group.
pub(crate) fn partition_ocr_text(text: &str) -> Vec<CellGrid> {
    let mut groups = Vec::new();
    let mut current: CellGrid = Vec::new();

    for line in text.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() <= 1 {
            if !current.is_empty() {
                groups.push(std::mem::take(&mut current));
            }
            continue;
        }
        current.push(tokens.into_iter().map(|t| Some(t.to_string())).collect());
    }

    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::table::validate_grid;
    use crate::options::TableOptions;

    fn row_lengths(grid: &CellGrid) -> Vec<usize> {
        grid.iter().map(Vec::len).collect()
    }

    #[test]
    fn test_single_token_line_ends_group() {
        let text = "Name Qty Price\nBolt 4 0.10\nNut 9 0.05\nTotals\nA B\nC D\n";
        let groups = partition_ocr_text(text);
        assert_eq!(groups.len(), 2);
        assert_eq!(row_lengths(&groups[0]), vec![3, 3, 3]);
        assert_eq!(groups[0][1][0].as_deref(), Some("Bolt"));
        assert_eq!(row_lengths(&groups[1]), vec![2, 2]);
    }

    #[test]
    fn test_closing_line_stays_out_of_group() {
        // The single-token line would be a one-column row and fail
        // validation for the whole group if it were appended
        let text = "Item Count\nApples 4\nPears 7\nEnd\nnotes follow here\n";
        let groups = partition_ocr_text(text);
        assert_eq!(groups.len(), 2);
        assert_eq!(row_lengths(&groups[0]), vec![2, 2, 2]);
        assert!(groups[0]
            .iter()
            .flatten()
            .all(|cell| cell.as_deref() != Some("End")));

        let options = TableOptions::default();
        assert!(validate_grid(&groups[0], &options).is_ok());
        // A trailing single-row group is kept and left to validation
        assert_eq!(row_lengths(&groups[1]), vec![3]);
        assert!(validate_grid(&groups[1], &options).is_err());
    }

    #[test]
    fn test_blank_line_ends_group() {
        let groups = partition_ocr_text("a b\nc d\n\n   \ne f\n");
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1], vec![vec![Some("e".to_string()), Some("f".to_string())]]);
    }

    #[test]
    fn test_no_rows() {
        assert!(partition_ocr_text("").is_empty());
        assert!(partition_ocr_text("Heading\n\nParagraph\n").is_empty());
    }
}
