//! Column groups, cell ranges and machine rows

use chrono::{Duration, NaiveDate};

use crate::ingest::error::IngestError;
use crate::ingest::types::{CellValue, MachineProfile, MachineRegistry, RawSheet, week_start_of};

/// One week's run of columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnGroup {
    /// Position of the group, 0 = first week on the sheet
    pub index: usize,
    /// First column of the group
    pub col_start: usize,
    /// Number of columns; the trailing group may be narrower than the stride
    pub width: usize,
}

/// Week groups cut from an anchor row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGroups {
    pub anchor_row: usize,
    pub stride: usize,
    pub groups: Vec<ColumnGroup>,
}

impl ColumnGroups {
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ColumnGroup> {
        self.groups.iter()
    }
}

/// Partition the sheet's columns into groups of `column_stride`, starting at
/// `first_column`
///
/// Group contents are not validated here.
pub fn locate_data_block(
    sheet: &RawSheet,
    anchor_row: usize,
    column_stride: usize,
    first_column: usize,
) -> ColumnGroups {
    let width = sheet.width();
    let mut groups = Vec::new();

    if column_stride > 0 {
        let mut col_start = first_column;
        while col_start < width {
            groups.push(ColumnGroup {
                index: groups.len(),
                col_start,
                width: column_stride.min(width - col_start),
            });
            col_start += column_stride;
        }
    }

    ColumnGroups {
        anchor_row,
        stride: column_stride,
        groups,
    }
}

/// Exactly `count` cells starting at (row, col_start); blanks stay `Missing`
pub fn extract_cell_range(
    sheet: &RawSheet,
    row: usize,
    col_start: usize,
    count: usize,
) -> Vec<CellValue> {
    (col_start..col_start + count)
        .map(|col| sheet.cell(row, col).clone())
        .collect()
}

/// Whether a week group carries production data
///
/// At least one value must be present and non-zero. Present values that are
/// not numbers count as data so the aggregator can report them.
pub fn has_production_data(values: &[CellValue]) -> bool {
    values.iter().any(|v| match v.as_count() {
        Ok(Some(n)) => n != 0.0,
        Ok(None) => false,
        Err(_) => true,
    })
}

/// A data row belonging to a configured machine
#[derive(Debug, Clone, PartialEq)]
pub struct MachineRow<'a> {
    pub row: usize,
    pub machine: &'a MachineProfile,
}

/// Rows below the anchor whose label cell names a known machine
pub fn find_machine_rows<'a>(
    sheet: &RawSheet,
    anchor_row: usize,
    label_column: usize,
    machines: &'a MachineRegistry,
) -> Vec<MachineRow<'a>> {
    (anchor_row + 1..sheet.height())
        .filter_map(|row| {
            let label = match sheet.cell(row, label_column) {
                CellValue::Text(s) => s.clone(),
                CellValue::Number(n) => n.to_string(),
                _ => return None,
            };
            let machine = machines.match_label(&label);
            if machine.is_none() {
                log::trace!("Row {} label '{}' is not a known machine", row + 1, label);
            }
            machine.map(|machine| MachineRow { row, machine })
        })
        .collect()
}

/// Monday of the week a group covers
///
/// Prefers a date in the anchor row at the group's first column, then the
/// layout's first week plus one week per group.
pub fn resolve_week_start(
    sheet: &RawSheet,
    anchor_row: usize,
    group: &ColumnGroup,
    first_week_start: Option<NaiveDate>,
) -> Result<NaiveDate, IngestError> {
    if let Some(date) = sheet.cell(anchor_row, group.col_start).as_date() {
        return Ok(week_start_of(date));
    }

    first_week_start
        .map(|start| week_start_of(start) + Duration::weeks(group.index as i64))
        .ok_or(IngestError::WeekStartUnresolved {
            group: group.index,
            column: group.col_start,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_locate_data_block_partitions_by_stride() {
        let row: Vec<CellValue> = (0..19).map(|i| num(i as f64)).collect();
        let sheet = RawSheet::new("Hits", vec![row]);

        let block = locate_data_block(&sheet, 0, 8, 2);

        assert_eq!(block.len(), 3);
        assert_eq!(block.groups[0], ColumnGroup { index: 0, col_start: 2, width: 8 });
        assert_eq!(block.groups[1], ColumnGroup { index: 1, col_start: 10, width: 8 });
        // Trailing partial group
        assert_eq!(block.groups[2], ColumnGroup { index: 2, col_start: 18, width: 1 });
    }

    #[test]
    fn test_locate_data_block_offset_past_width() {
        let sheet = RawSheet::new("Hits", vec![vec![num(1.0); 3]]);
        assert!(locate_data_block(&sheet, 0, 7, 5).is_empty());
        assert!(locate_data_block(&sheet, 0, 0, 0).is_empty());
    }

    #[test]
    fn test_extract_cell_range_pads_with_missing() {
        let sheet = RawSheet::new("Hits", vec![vec![num(5.0), CellValue::Missing, num(0.0)]]);

        let values = extract_cell_range(&sheet, 0, 0, 5);
        assert_eq!(
            values,
            vec![num(5.0), CellValue::Missing, num(0.0), CellValue::Missing, CellValue::Missing]
        );
        assert_eq!(extract_cell_range(&sheet, 3, 0, 2).len(), 2);
    }

    #[test]
    fn test_has_production_data() {
        assert!(!has_production_data(&vec![CellValue::Missing; 7]));
        assert!(!has_production_data(&vec![num(0.0); 7]));

        let mut values = vec![CellValue::Missing; 7];
        values[3] = num(12.0);
        assert!(has_production_data(&values));

        values[3] = CellValue::Text("down".into());
        assert!(has_production_data(&values));

        values[3] = CellValue::Text("-".into());
        assert!(!has_production_data(&values));
    }

    #[test]
    fn test_find_machine_rows() {
        let registry = MachineRegistry::new(vec![
            MachineProfile::new("P-1200", "1200 Ton Press", 900.0),
            MachineProfile::new("600", "600 Ton Press", 1400.0),
        ])
        .unwrap();
        let sheet = RawSheet::new(
            "Hits",
            vec![
                vec![CellValue::Text("P-1200".into())],
                vec![CellValue::Text("Capacity".into())],
                vec![CellValue::Text("1200 ton press".into())],
                vec![CellValue::Text("Total".into())],
                vec![num(600.0)],
                vec![CellValue::Missing],
            ],
        );

        let rows = find_machine_rows(&sheet, 1, 0, &registry);
        let found: Vec<(usize, &str)> = rows.iter().map(|r| (r.row, r.machine.id.as_str())).collect();
        assert_eq!(found, vec![(2, "P-1200"), (4, "600")]);
    }

    #[test]
    fn test_resolve_week_start() {
        let sheet = RawSheet::new(
            "Hits",
            vec![vec![
                CellValue::Text("Press".into()),
                CellValue::DateLike("1/8/2025".into()),
                CellValue::Missing,
            ]],
        );
        let dated = ColumnGroup { index: 0, col_start: 1, width: 7 };
        let undated = ColumnGroup { index: 2, col_start: 2, width: 7 };

        assert_eq!(resolve_week_start(&sheet, 0, &dated, None), Ok(date(2025, 1, 6)));
        assert_eq!(
            resolve_week_start(&sheet, 0, &undated, Some(date(2025, 1, 6))),
            Ok(date(2025, 1, 20))
        );
        assert_eq!(
            resolve_week_start(&sheet, 0, &undated, None),
            Err(IngestError::WeekStartUnresolved { group: 2, column: 2 })
        );
    }
}
