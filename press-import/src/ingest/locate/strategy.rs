//! Row locator strategies

use regex::Regex;

use crate::ingest::error::IngestError;
use crate::ingest::types::{CellValue, RawSheet};

/// Default number of rows scanned when looking for an anchor row
pub const DEFAULT_SCAN_WINDOW: usize = 30;

/// Decides whether a row is the anchor row of a sheet family
pub trait RowLocator: Send + Sync {
    fn matches(&self, row: &[CellValue]) -> bool;

    /// Short description used in diagnostics
    fn describe(&self) -> Vec<String>;
}

/// Matches rows where any text cell contains one of the keywords
/// (case-insensitive substring)
#[derive(Debug, Clone)]
pub struct KeywordLocator {
    keywords: Vec<String>,
}

impl KeywordLocator {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        KeywordLocator {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl RowLocator for KeywordLocator {
    fn matches(&self, row: &[CellValue]) -> bool {
        row.iter().filter_map(|c| c.as_text()).any(|text| {
            let text = text.to_lowercase();
            self.keywords.iter().any(|k| text.contains(k.as_str()))
        })
    }

    fn describe(&self) -> Vec<String> {
        self.keywords.clone()
    }
}

/// Matches rows where any text cell matches a regular expression
#[derive(Debug, Clone)]
pub struct RegexLocator {
    pattern: Regex,
}

impl RegexLocator {
    pub fn new(pattern: Regex) -> Self {
        RegexLocator { pattern }
    }
}

impl RowLocator for RegexLocator {
    fn matches(&self, row: &[CellValue]) -> bool {
        row.iter()
            .filter_map(|c| c.as_text())
            .any(|text| self.pattern.is_match(text))
    }

    fn describe(&self) -> Vec<String> {
        vec![format!("/{}/", self.pattern.as_str())]
    }
}

/// Scan the first `scan_window` rows and return the first one the locator accepts
pub fn locate_row(
    sheet: &RawSheet,
    locator: &dyn RowLocator,
    scan_window: usize,
) -> Result<usize, IngestError> {
    sheet
        .rows()
        .take(scan_window)
        .position(|row| locator.matches(row))
        .ok_or_else(|| IngestError::HeaderNotFound {
            sheet: sheet.name.clone(),
            keywords: locator.describe(),
            window: scan_window,
        })
}

/// Find the header row by keyword (case-insensitive substring)
pub fn locate_header_row<S: AsRef<str>>(
    sheet: &RawSheet,
    keywords: &[S],
    scan_window: usize,
) -> Result<usize, IngestError> {
    let locator = KeywordLocator::new(keywords.iter().map(|k| k.as_ref()));
    locate_row(sheet, &locator, scan_window)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn sheet_with_header_at(row: usize, header: &str) -> RawSheet {
        let mut rows = vec![vec![CellValue::Missing, CellValue::Number(1.0)]; row];
        rows.push(vec![CellValue::Missing, text(header)]);
        rows.push(vec![text("P-1200"), CellValue::Number(1000.0)]);
        RawSheet::new("Hits", rows)
    }

    #[test]
    fn test_locate_header_row_case_insensitive() {
        let sheet = sheet_with_header_at(4, "Weekly CAPACITY plan");
        assert_eq!(locate_header_row(&sheet, &["capacity"], 30), Ok(4));
    }

    #[test]
    fn test_first_match_wins() {
        let mut rows = vec![
            vec![text("Notes")],
            vec![text("Total hits")],
            vec![text("Capacity")],
        ];
        rows.push(vec![text("Total")]);
        let sheet = RawSheet::new("Plan", rows);

        assert_eq!(locate_header_row(&sheet, &["capacity", "total"], 30), Ok(1));
    }

    #[test]
    fn test_header_not_found_outside_window() {
        let sheet = sheet_with_header_at(35, "Capacity");

        let err = locate_header_row(&sheet, &["Capacity"], 30).unwrap_err();
        assert_eq!(
            err,
            IngestError::HeaderNotFound {
                sheet: "Hits".to_string(),
                keywords: vec!["capacity".to_string()],
                window: 30,
            }
        );

        assert_eq!(locate_header_row(&sheet, &["Capacity"], 40), Ok(35));
    }

    #[test]
    fn test_numbers_never_match_keywords() {
        let sheet = RawSheet::new("Hits", vec![vec![CellValue::Number(2025.0)]]);
        assert!(locate_header_row(&sheet, &["2025"], 30).is_err());
    }

    #[test]
    fn test_regex_locator() {
        let sheet = sheet_with_header_at(2, "Week of 1/6/2025");
        let locator = RegexLocator::new(Regex::new(r"(?i)^week of").unwrap());
        assert_eq!(locate_row(&sheet, &locator, 30), Ok(2));
    }
}
