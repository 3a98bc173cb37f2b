//! Repository for import run history

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::ingest::report::ImportReport;

/// Summary of a past import run (for listing)
#[derive(Debug, Clone)]
pub struct ImportRunSummary {
    pub id: String,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub inserted: i64,
    pub replaced: i64,
    pub failed: i64,
    pub warnings: i64,
    pub errors: i64,
}

/// Store the outcome of an import run
pub async fn record_import_run(pool: &SqlitePool, report: &ImportReport) -> Result<()> {
    let report_json = serde_json::to_string(report).context("Failed to serialize import report")?;

    sqlx::query(
        r#"
        INSERT INTO import_runs
            (id, source, started_at, finished_at, dry_run, sheets_processed, sheets_skipped,
             inserted, replaced, failed, aborted, warnings, errors, report_json)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(report.run_id.to_string())
    .bind(&report.source)
    .bind(report.started_at.to_rfc3339())
    .bind(report.finished_at.map(|t| t.to_rfc3339()))
    .bind(report.dry_run)
    .bind(report.sheets_processed as i64)
    .bind(report.sheets_skipped as i64)
    .bind(report.inserted as i64)
    .bind(report.replaced as i64)
    .bind(report.failed as i64)
    .bind(report.aborted as i64)
    .bind(report.warnings().count() as i64)
    .bind(report.errors().count() as i64)
    .bind(report_json)
    .execute(pool)
    .await
    .context("Failed to record import run")?;

    Ok(())
}

/// Most recent import runs, newest first
pub async fn list_import_runs(pool: &SqlitePool, limit: usize) -> Result<Vec<ImportRunSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT id, source, started_at, inserted, replaced, failed, warnings, errors
        FROM import_runs
        ORDER BY started_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .context("Failed to list import runs")?;

    let mut runs = Vec::new();
    for row in rows {
        let started_at: String = row.try_get("started_at")?;
        runs.push(ImportRunSummary {
            id: row.try_get("id")?,
            source: row.try_get("source")?,
            started_at: DateTime::parse_from_rfc3339(&started_at)
                .context("Invalid started_at in database")?
                .with_timezone(&Utc),
            inserted: row.try_get("inserted")?,
            replaced: row.try_get("replaced")?,
            failed: row.try_get("failed")?,
            warnings: row.try_get("warnings")?,
            errors: row.try_get("errors")?,
        });
    }

    Ok(runs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::repository::migrations::connect_memory;
    use crate::ingest::report::{Diagnostic, DiagnosticKind};

    #[tokio::test]
    async fn test_record_and_list_runs() {
        let pool = connect_memory().await;

        let mut report = ImportReport::new("hits.xlsx");
        report.inserted = 3;
        report.push(Diagnostic::warning(DiagnosticKind::TotalsMismatch, "sheet says 4300"));
        report.finish();
        record_import_run(&pool, &report).await.unwrap();

        let runs = list_import_runs(&pool, 10).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].id, report.run_id.to_string());
        assert_eq!(runs[0].source, "hits.xlsx");
        assert_eq!(runs[0].inserted, 3);
        assert_eq!(runs[0].warnings, 1);
        assert_eq!(runs[0].errors, 0);
    }
}
