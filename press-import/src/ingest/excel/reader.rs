//! Read workbook sheets into `RawSheet` grids

use anyhow::{Context, Result};
use calamine::{Data, Range, Reader, open_workbook_auto};
use std::path::Path;

use crate::ingest::types::{CellValue, RawSheet, excel_serial_to_date};

/// Convert a workbook cell into a `CellValue`
fn cell_to_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Missing,
        Data::String(s) => CellValue::from_text(s),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Float(f) => CellValue::Number(*f),
        Data::Bool(b) => CellValue::Text(b.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if dt.is_datetime() {
                match excel_serial_to_date(serial) {
                    Some(date) => CellValue::DateLike(date.format("%Y-%m-%d").to_string()),
                    None => CellValue::Number(serial),
                }
            } else {
                // Durations are plain numbers for our purposes
                CellValue::Number(serial)
            }
        }
        Data::DateTimeIso(s) => CellValue::DateLike(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Missing,
    }
}

/// Build a `RawSheet` from a worksheet range
///
/// Ranges start at the first used cell, so the grid is padded with missing
/// cells to keep row/column numbers absolute (A1 = (0, 0)).
pub fn sheet_from_range(name: &str, range: &Range<Data>) -> RawSheet {
    let (start_row, start_col) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<CellValue>> = vec![Vec::new(); start_row];
    for row in range.rows() {
        let mut cells = vec![CellValue::Missing; start_col];
        cells.extend(row.iter().map(cell_to_value));
        rows.push(cells);
    }

    RawSheet::new(name, rows)
}

/// Read every sheet of a workbook (xlsx, xlsm, xls or ods)
pub fn read_workbook<P: AsRef<Path>>(path: P) -> Result<Vec<RawSheet>> {
    let path = path.as_ref();
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(sheet_names.len());

    for sheet_name in sheet_names {
        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet: {}", sheet_name))?;

        let sheet = sheet_from_range(&sheet_name, &range);
        log::debug!(
            "Read sheet '{}': {} rows x {} columns",
            sheet.name,
            sheet.height(),
            sheet.width()
        );
        sheets.push(sheet);
    }

    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn test_cell_to_value() {
        assert_eq!(cell_to_value(&Data::Empty), CellValue::Missing);
        assert_eq!(cell_to_value(&Data::String("  ".into())), CellValue::Missing);
        assert_eq!(cell_to_value(&Data::Int(12)), CellValue::Number(12.0));
        assert_eq!(cell_to_value(&Data::Float(0.0)), CellValue::Number(0.0));
        assert_eq!(
            cell_to_value(&Data::String("Capacity".into())),
            CellValue::Text("Capacity".into())
        );
        assert_eq!(
            cell_to_value(&Data::DateTimeIso("2025-01-06".into())),
            CellValue::DateLike("2025-01-06".into())
        );
    }

    #[test]
    fn test_read_workbook_keeps_absolute_positions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hits.xlsx");

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.set_name("Hits").unwrap();
        // First used cell is C3
        worksheet.write_string(2, 2, "Capacity").unwrap();
        worksheet.write_number(3, 2, 1000.0).unwrap();
        worksheet.write_number(3, 4, 0.0).unwrap();
        workbook.add_worksheet().set_name("Notes").unwrap();
        workbook.save(&path).unwrap();

        let sheets = read_workbook(&path).unwrap();
        assert_eq!(sheets.len(), 2);

        let hits = &sheets[0];
        assert_eq!(hits.name, "Hits");
        assert_eq!(hits.cell(2, 2), &CellValue::Text("Capacity".into()));
        assert_eq!(hits.cell(3, 2), &CellValue::Number(1000.0));
        assert_eq!(hits.cell(3, 3), &CellValue::Missing);
        assert_eq!(hits.cell(3, 4), &CellValue::Number(0.0));
        assert_eq!(hits.cell(0, 0), &CellValue::Missing);

        assert_eq!(sheets[1].name, "Notes");
        assert_eq!(sheets[1].height(), 0);
    }

    #[test]
    fn test_read_workbook_missing_file() {
        let err = read_workbook("/nonexistent/report.xlsx").unwrap_err();
        assert!(err.to_string().contains("Failed to open workbook"));
    }
}
