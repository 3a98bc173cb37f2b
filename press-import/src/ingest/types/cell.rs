//! Spreadsheet cell representation for ingestion

use chrono::{Datelike, Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::ingest::error::CellError;

/// Full-text date formats recognised as `DateLike`
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d-%b-%Y", "%d-%b-%y"];

/// Excel serial numbers for 1970-01-01 and 2100-01-01
const EXCEL_SERIAL_MIN: f64 = 25_569.0;
const EXCEL_SERIAL_MAX: f64 = 73_051.0;

static EMBEDDED_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{4}-\d{1,2}-\d{1,2})|(\d{1,2}/\d{1,2}/\d{2,4})").expect("valid date regex")
});

/// A single cell read from a sheet
///
/// `Missing` is distinct from a reported zero: a blank cell means nobody
/// entered a figure, `Number(0.0)` means someone entered zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Empty, blank or error cell
    Missing,
    /// Free text
    Text(String),
    /// Numeric cell
    Number(f64),
    /// Date cell or text that reads as a date
    DateLike(String),
}

impl CellValue {
    /// Classify a string cell, trimming surrounding whitespace
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return CellValue::Missing;
        }
        if parse_date_text(trimmed).is_some() {
            return CellValue::DateLike(trimmed.to_string());
        }
        CellValue::Text(trimmed.to_string())
    }

    /// Text content for header matching (text and date-like cells only)
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) | CellValue::DateLike(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce to a production count
    ///
    /// Returns `Ok(None)` for missing cells (including "-" placeholders).
    pub fn as_count(&self) -> Result<Option<f64>, CellError> {
        match self {
            CellValue::Missing => Ok(None),
            CellValue::Number(n) if n.is_finite() => Ok(Some(*n)),
            CellValue::Number(n) => Err(CellError::NotNumeric(n.to_string())),
            CellValue::Text(s) => {
                let cleaned: String = s
                    .chars()
                    .filter(|c| !c.is_whitespace() && *c != ',')
                    .collect();
                if cleaned.is_empty() || cleaned == "-" {
                    return Ok(None);
                }
                cleaned
                    .parse::<f64>()
                    .ok()
                    .filter(|n| n.is_finite())
                    .map(Some)
                    .ok_or_else(|| CellError::NotNumeric(s.clone()))
            }
            CellValue::DateLike(s) => Err(CellError::NotNumeric(s.clone())),
        }
    }

    /// Interpret the cell as a calendar date, if it holds one
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            CellValue::Missing => None,
            CellValue::DateLike(s) => parse_date_text(s).or_else(|| find_embedded_date(s)),
            CellValue::Number(n) => excel_serial_to_date(*n),
            CellValue::Text(s) => find_embedded_date(s),
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Missing => write!(f, "(missing)"),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::DateLike(s) => write!(f, "{}", s),
        }
    }
}

impl Default for CellValue {
    fn default() -> Self {
        CellValue::Missing
    }
}

/// Parse text that is entirely a date (optionally with a midnight time part)
fn parse_date_text(s: &str) -> Option<NaiveDate> {
    let date_part = s.split(['T', ' ']).next().unwrap_or(s);
    DATE_FORMATS
        .iter()
        .find_map(|fmt| {
            NaiveDate::parse_from_str(date_part, fmt)
                .ok()
                .filter(|d| d.year() >= 1970)
        })
}

fn find_embedded_date(s: &str) -> Option<NaiveDate> {
    EMBEDDED_DATE
        .find_iter(s)
        .find_map(|m| parse_date_text(m.as_str()))
}

/// Convert an Excel serial day number (1900 date system) to a date
///
/// Only serials between 1970 and 2100 are accepted, so ordinary counts are
/// never mistaken for dates.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !(EXCEL_SERIAL_MIN..EXCEL_SERIAL_MAX).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.trunc() as i64))
}
