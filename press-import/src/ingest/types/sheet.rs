//! In-memory sheet grid

use super::CellValue;

static MISSING: CellValue = CellValue::Missing;

/// One worksheet read into memory, addressed by absolute zero-based row/column
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    rows: Vec<Vec<CellValue>>,
}

impl RawSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        RawSheet {
            name: name.into(),
            rows,
        }
    }

    /// Number of rows in the grid
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Widest row length
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }

    /// Row cells, empty when out of range
    pub fn row(&self, row: usize) -> &[CellValue] {
        self.rows.get(row).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Cell at (row, col); out-of-range reads are `Missing`
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .unwrap_or(&MISSING)
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(|r| r.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_is_missing() {
        let sheet = RawSheet::new(
            "Hits",
            vec![
                vec![CellValue::Text("Press".into())],
                vec![CellValue::Number(1.0), CellValue::Number(2.0)],
            ],
        );

        assert_eq!(sheet.height(), 2);
        assert_eq!(sheet.width(), 2);
        assert_eq!(sheet.cell(0, 1), &CellValue::Missing);
        assert_eq!(sheet.cell(5, 0), &CellValue::Missing);
        assert_eq!(sheet.cell(1, 1), &CellValue::Number(2.0));
        assert!(sheet.row(9).is_empty());
    }
}
