//! Repository for weekly production records

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::ingest::reconcile::UpsertOutcome;
use crate::ingest::types::{DAYS_PER_WEEK, DailyBucket, NaturalKey, TotalSource, WeeklyRecord};

const DATE_FORMAT: &str = "%Y-%m-%d";

const SELECT_COLUMNS: &str =
    "machine_id, week_start, days_json, total, average, explicit_total, total_source";

/// Get the stored record for a natural key
pub async fn get_weekly(pool: &SqlitePool, key: &NaturalKey) -> Result<Option<WeeklyRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM weekly_production WHERE machine_id = ? AND week_start = ?",
        SELECT_COLUMNS
    ))
    .bind(&key.machine_id)
    .bind(key.week_start.format(DATE_FORMAT).to_string())
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to get weekly record {}", key))?;

    row.map(|r| record_from_row(&r)).transpose()
}

/// Insert a new record; fails if the natural key already exists
pub async fn insert_weekly(
    pool: &SqlitePool,
    record: &WeeklyRecord,
    run_id: Option<Uuid>,
) -> Result<()> {
    execute_insert(pool, record, run_id, "").await?;
    Ok(())
}

/// Replace buckets and totals of an existing record; returns false if absent
pub async fn update_weekly(
    pool: &SqlitePool,
    record: &WeeklyRecord,
    run_id: Option<Uuid>,
) -> Result<bool> {
    Ok(execute_update(pool, record, run_id).await? > 0)
}

/// Insert or fully replace the record stored under the record's natural key
///
/// Insert and replace run in one transaction, so the reported outcome holds
/// even with concurrent imports.
pub async fn upsert_weekly(
    pool: &SqlitePool,
    record: &WeeklyRecord,
    run_id: Option<Uuid>,
) -> Result<UpsertOutcome> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let inserted = execute_insert(
        &mut *tx,
        record,
        run_id,
        "ON CONFLICT(machine_id, week_start) DO NOTHING",
    )
    .await?;

    let outcome = if inserted > 0 {
        UpsertOutcome::Inserted
    } else {
        if execute_update(&mut *tx, record, run_id).await? == 0 {
            bail!("Weekly record {} was neither inserted nor updated", record.key());
        }
        UpsertOutcome::Replaced
    };

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(outcome)
}

async fn execute_insert<'e, E>(
    executor: E,
    record: &WeeklyRecord,
    run_id: Option<Uuid>,
    on_conflict: &str,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let days_json = serde_json::to_string(&record.days).context("Failed to serialize days")?;

    let result = sqlx::query(&format!(
        r#"
        INSERT INTO weekly_production
            (machine_id, week_start, days_json, total, average, explicit_total, total_source, last_run_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        {}
        "#,
        on_conflict
    ))
    .bind(&record.machine_id)
    .bind(record.week_start.format(DATE_FORMAT).to_string())
    .bind(days_json)
    .bind(record.total)
    .bind(record.average)
    .bind(record.explicit_total)
    .bind(record.total_source.as_str())
    .bind(run_id.map(|id| id.to_string()))
    .execute(executor)
    .await
    .with_context(|| format!("Failed to insert weekly record {}", record.key()))?;

    Ok(result.rows_affected())
}

async fn execute_update<'e, E>(executor: E, record: &WeeklyRecord, run_id: Option<Uuid>) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let days_json = serde_json::to_string(&record.days).context("Failed to serialize days")?;

    let result = sqlx::query(
        r#"
        UPDATE weekly_production
        SET days_json = ?,
            total = ?,
            average = ?,
            explicit_total = ?,
            total_source = ?,
            last_run_id = ?,
            updated_at = datetime('now')
        WHERE machine_id = ? AND week_start = ?
        "#,
    )
    .bind(days_json)
    .bind(record.total)
    .bind(record.average)
    .bind(record.explicit_total)
    .bind(record.total_source.as_str())
    .bind(run_id.map(|id| id.to_string()))
    .bind(&record.machine_id)
    .bind(record.week_start.format(DATE_FORMAT).to_string())
    .execute(executor)
    .await
    .with_context(|| format!("Failed to update weekly record {}", record.key()))?;

    Ok(result.rows_affected())
}

/// Delete the record for a natural key; returns false if absent
pub async fn delete_weekly(pool: &SqlitePool, key: &NaturalKey) -> Result<bool> {
    let result =
        sqlx::query("DELETE FROM weekly_production WHERE machine_id = ? AND week_start = ?")
            .bind(&key.machine_id)
            .bind(key.week_start.format(DATE_FORMAT).to_string())
            .execute(pool)
            .await
            .with_context(|| format!("Failed to delete weekly record {}", key))?;

    Ok(result.rows_affected() > 0)
}

/// Most recent weeks for a machine, newest first
pub async fn list_weekly(
    pool: &SqlitePool,
    machine_id: &str,
    limit: usize,
) -> Result<Vec<WeeklyRecord>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM weekly_production WHERE machine_id = ? ORDER BY week_start DESC LIMIT ?",
        SELECT_COLUMNS
    ))
    .bind(machine_id)
    .bind(limit as i64)
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to list weekly records for '{}'", machine_id))?;

    rows.iter().map(record_from_row).collect()
}

fn record_from_row(row: &SqliteRow) -> Result<WeeklyRecord> {
    let week_start: String = row.try_get("week_start")?;
    let week_start = NaiveDate::parse_from_str(&week_start, DATE_FORMAT)
        .with_context(|| format!("Invalid week_start '{}' in database", week_start))?;

    let days_json: String = row.try_get("days_json")?;
    let days: [DailyBucket; DAYS_PER_WEEK] =
        serde_json::from_str(&days_json).context("Failed to deserialize days")?;

    let total_source: String = row.try_get("total_source")?;
    let total_source = TotalSource::parse(&total_source)
        .with_context(|| format!("Unknown total_source '{}' in database", total_source))?;

    Ok(WeeklyRecord {
        machine_id: row.try_get("machine_id")?,
        week_start,
        days,
        total: row.try_get("total")?,
        average: row.try_get("average")?,
        explicit_total: row.try_get("explicit_total")?,
        total_source,
    })
}
