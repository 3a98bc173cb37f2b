//! Repository for machine rows

use anyhow::{Context, Result};
use chrono::NaiveDate;
use sqlx::{Row, SqlitePool};

use crate::ingest::types::MachineProfile;

/// Stored production summary for one machine
#[derive(Debug, Clone, PartialEq)]
pub struct MachineSummary {
    pub id: String,
    pub name: String,
    pub weeks: i64,
    pub latest_week: Option<NaiveDate>,
}

/// Insert or refresh machine rows from configuration
pub async fn sync_machines(pool: &SqlitePool, machines: &[MachineProfile]) -> Result<usize> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    for machine in machines {
        sqlx::query(
            r#"
            INSERT INTO machines (id, name, target_rate)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                target_rate = excluded.target_rate,
                updated_at = datetime('now')
            "#,
        )
        .bind(&machine.id)
        .bind(&machine.name)
        .bind(machine.target_rate)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to sync machine '{}'", machine.id))?;
    }

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(machines.len())
}

/// List machines with how many weeks are stored for each
pub async fn list_machine_summaries(pool: &SqlitePool) -> Result<Vec<MachineSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT
            m.id,
            m.name,
            COUNT(w.id) as weeks,
            MAX(w.week_start) as latest_week
        FROM machines m
        LEFT JOIN weekly_production w ON w.machine_id = m.id
        GROUP BY m.id
        ORDER BY m.id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to list machines")?;

    let mut summaries = Vec::new();
    for row in rows {
        let latest_week: Option<String> = row.try_get("latest_week")?;
        summaries.push(MachineSummary {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            weeks: row.try_get("weeks")?,
            latest_week: latest_week
                .map(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d"))
                .transpose()
                .context("Invalid week_start in database")?,
        });
    }

    Ok(summaries)
}
