//! Per-run import report and diagnostics

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ingest::error::{AggregationError, IngestError, Warning};
use crate::ingest::types::NaturalKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// What a diagnostic is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    HeaderNotFound,
    HeaderFallback,
    WeekStartUnresolved,
    IncompleteGroup,
    NegativeValue,
    InvalidCell,
    TotalsMismatch,
    DuplicateKeyConflict,
    StorageFailure,
    Aborted,
}

impl DiagnosticKind {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosticKind::HeaderNotFound => "header not found",
            DiagnosticKind::HeaderFallback => "header fallback",
            DiagnosticKind::WeekStartUnresolved => "week start unresolved",
            DiagnosticKind::IncompleteGroup => "incomplete group",
            DiagnosticKind::NegativeValue => "negative value",
            DiagnosticKind::InvalidCell => "invalid cell",
            DiagnosticKind::TotalsMismatch => "totals mismatch",
            DiagnosticKind::DuplicateKeyConflict => "duplicate key conflict",
            DiagnosticKind::StorageFailure => "storage failure",
            DiagnosticKind::Aborted => "aborted",
        }
    }
}

impl From<&IngestError> for DiagnosticKind {
    fn from(err: &IngestError) -> Self {
        match err {
            IngestError::HeaderNotFound { .. } => DiagnosticKind::HeaderNotFound,
            IngestError::WeekStartUnresolved { .. } => DiagnosticKind::WeekStartUnresolved,
        }
    }
}

impl From<&AggregationError> for DiagnosticKind {
    fn from(err: &AggregationError) -> Self {
        match err {
            AggregationError::IncompleteGroup { .. } => DiagnosticKind::IncompleteGroup,
            AggregationError::NegativeValue { .. } => DiagnosticKind::NegativeValue,
            AggregationError::InvalidCell { .. } => DiagnosticKind::InvalidCell,
        }
    }
}

impl From<&Warning> for DiagnosticKind {
    fn from(warning: &Warning) -> Self {
        match warning {
            Warning::TotalsMismatch { .. } => DiagnosticKind::TotalsMismatch,
            Warning::DuplicateKeyConflict { .. } => DiagnosticKind::DuplicateKeyConflict,
        }
    }
}

/// Where in the workbook a record came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub sheet: String,
    /// Zero-based row
    pub row: usize,
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sheet '{}' row {}", self.sheet, self.row + 1)
    }
}

/// A warning or error with enough context to find the source cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    pub sheet: Option<String>,
    /// Zero-based row
    pub row: Option<usize>,
    pub machine_id: Option<String>,
    pub week_start: Option<NaiveDate>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            kind,
            sheet: None,
            row: None,
            machine_id: None,
            week_start: None,
            message: message.into(),
        }
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Warning, kind, message)
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Error, kind, message)
    }

    pub fn in_sheet(mut self, sheet: impl Into<String>) -> Self {
        self.sheet = Some(sheet.into());
        self
    }

    pub fn at(mut self, location: &SourceLocation) -> Self {
        self.sheet = Some(location.sheet.clone());
        self.row = Some(location.row);
        self
    }

    pub fn for_key(mut self, key: &NaturalKey) -> Self {
        self.machine_id = Some(key.machine_id.clone());
        self.week_start = Some(key.week_start);
        self
    }

    pub fn for_machine(mut self, machine_id: impl Into<String>) -> Self {
        self.machine_id = Some(machine_id.into());
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut context = Vec::new();
        if let Some(sheet) = &self.sheet {
            context.push(format!("sheet '{}'", sheet));
        }
        if let Some(row) = self.row {
            context.push(format!("row {}", row + 1));
        }
        if let Some(machine) = &self.machine_id {
            context.push(machine.clone());
        }
        if let Some(week) = self.week_start {
            context.push(format!("week of {}", week));
        }

        if context.is_empty() {
            write!(f, "{}: {}", self.kind.label(), self.message)
        } else {
            write!(f, "[{}] {}: {}", context.join(", "), self.kind.label(), self.message)
        }
    }
}

/// Outcome of one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub sheets_processed: usize,
    pub sheets_skipped: usize,
    /// Week groups turned into records (before batch de-duplication)
    pub groups_staged: usize,
    /// Week groups with no production data
    pub empty_groups: usize,
    /// Week groups dropped because of an error
    pub skipped_groups: usize,
    pub inserted: usize,
    pub replaced: usize,
    pub failed: usize,
    pub aborted: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl ImportReport {
    pub fn new(source: impl Into<String>) -> Self {
        ImportReport {
            run_id: Uuid::new_v4(),
            source: source.into(),
            started_at: Utc::now(),
            finished_at: None,
            dry_run: false,
            sheets_processed: 0,
            sheets_skipped: 0,
            groups_staged: 0,
            empty_groups: 0,
            skipped_groups: 0,
            inserted: 0,
            replaced: 0,
            failed: 0,
            aborted: 0,
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => log::warn!("{}", diagnostic),
            Severity::Error => log::error!("{}", diagnostic),
        }
        self.diagnostics.push(diagnostic);
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    pub fn count_kind(&self, kind: DiagnosticKind) -> usize {
        self.diagnostics.iter().filter(|d| d.kind == kind).count()
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_display_includes_context() {
        let key = NaturalKey::new("P-1200", NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        let location = SourceLocation {
            sheet: "Hits".into(),
            row: 4,
        };

        let diagnostic = Diagnostic::warning(DiagnosticKind::TotalsMismatch, "sheet says 4300")
            .at(&location)
            .for_key(&key);

        assert_eq!(
            diagnostic.to_string(),
            "[sheet 'Hits', row 5, P-1200, week of 2025-01-06] totals mismatch: sheet says 4300"
        );
    }

    #[test]
    fn test_report_counts_by_severity() {
        let mut report = ImportReport::new("hits.xlsx");
        report.push(Diagnostic::warning(DiagnosticKind::TotalsMismatch, "a"));
        report.push(Diagnostic::error(DiagnosticKind::HeaderNotFound, "b").in_sheet("Plan"));

        assert_eq!(report.warnings().count(), 1);
        assert_eq!(report.errors().count(), 1);
        assert!(report.has_errors());
        assert_eq!(report.count_kind(DiagnosticKind::HeaderNotFound), 1);
    }
}
