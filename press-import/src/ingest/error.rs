//! Error and warning taxonomy for the import pipeline

use chrono::{NaiveDate, Weekday};
use thiserror::Error;

/// A cell could not be coerced to the requested type
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CellError {
    #[error("expected a number, found '{0}'")]
    NotNumeric(String),
}

/// Failures while locating structure inside a sheet
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("no header row matching {keywords:?} in the first {window} rows of sheet '{sheet}'")]
    HeaderNotFound {
        sheet: String,
        keywords: Vec<String>,
        window: usize,
    },

    #[error("cannot determine the week start for column group {group} (column {column})")]
    WeekStartUnresolved { group: usize, column: usize },
}

/// A single week-group could not be turned into a record
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AggregationError {
    #[error("week group has {found} day values, expected {expected}")]
    IncompleteGroup { expected: usize, found: usize },

    #[error("negative production value {value} on {day}")]
    NegativeValue { day: Weekday, value: f64 },

    #[error("invalid value on {day}: {source}")]
    InvalidCell {
        day: Weekday,
        #[source]
        source: CellError,
    },
}

/// Non-fatal conditions surfaced to the operator
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// The sheet's own weekly total disagrees with the sum of the days
    TotalsMismatch { computed: f64, explicit: f64 },
    /// Two rows in one batch reported different values for the same key
    DuplicateKeyConflict {
        machine_id: String,
        week_start: NaiveDate,
        first: String,
        second: String,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::TotalsMismatch { computed, explicit } => write!(
                f,
                "sheet total {} differs from computed total {}; keeping sheet total",
                explicit, computed
            ),
            Warning::DuplicateKeyConflict {
                machine_id,
                week_start,
                first,
                second,
            } => write!(
                f,
                "{} week of {} reported twice with different values ({} and {}); later values win per day",
                machine_id, week_start, first, second
            ),
        }
    }
}

/// Failures while merging duplicate reference rows
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MergeError {
    #[error("canonical row '{id}' does not exist in '{table}'")]
    CanonicalMissing { table: String, id: String },

    #[error("row '{id}' is named '{name}', which does not match canonical name '{canonical_name}'")]
    NameMismatch {
        id: String,
        name: String,
        canonical_name: String,
    },

    #[error("invalid SQL identifier '{0}'")]
    InvalidIdentifier(String),
}
