//! Raw cell grid as delivered by the source

use serde::{Deserialize, Serialize};

/// Cell contents that count as "no value" besides blank strings.
pub const MISSING_MARKERS: &[&str] = &["nan", "NaN"];

/// An unparsed grid of optional text cells.
///
/// Row 0 is the header row. All rows are padded to the same width, so a
/// column index means the same thing on every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGrid {
    rows: Vec<Vec<Option<String>>>,
    width: usize,
}

impl RawGrid {
    /// Build a grid, padding short rows with absent cells
    pub fn new(mut rows: Vec<Vec<Option<String>>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, None);
        }
        Self { rows, width }
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.width
    }

    /// Total number of rows including the header
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Header row (empty if the grid has no rows)
    pub fn header(&self) -> &[Option<String>] {
        self.rows.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Rows after the header
    pub fn data_rows(&self) -> &[Vec<Option<String>>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Raw cell at a data row and column, as stored
    pub fn raw_cell(&self, data_row: usize, column: usize) -> Option<&str> {
        self.data_rows()
            .get(data_row)
            .and_then(|r| r.get(column))
            .and_then(|c| c.as_deref())
    }

    /// Cleaned cell at a data row and column
    pub fn cell(&self, data_row: usize, column: usize) -> Option<&str> {
        clean_cell(self.raw_cell(data_row, column))
    }
}

/// Trim a cell and collapse blanks and missing markers to `None`.
pub fn clean_cell(value: Option<&str>) -> Option<&str> {
    let trimmed = value?.trim();
    if trimmed.is_empty() || MISSING_MARKERS.contains(&trimmed) {
        None
    } else {
        Some(trimmed)
    }
}
