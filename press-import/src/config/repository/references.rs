//! Repository for reference tables and duplicate-row merges
//!
//! Table and column names come from a validated `ReferenceSet` and are
//! interpolated into the statements; all values are bound.

use anyhow::{Context, Result};
use sqlx::{Row, SqliteConnection, SqlitePool};
use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::ingest::error::MergeError;
use crate::ingest::reconcile::{DuplicateGroup, MergeOutcome, ReferenceSet};
use crate::ingest::types::normalize_label;

/// Total number of rows pointing at `id` across every referencing column
async fn count_references(conn: &mut SqliteConnection, set: &ReferenceSet, id: &str) -> Result<i64> {
    let mut total = 0;
    for reference in &set.references {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE {} = ?",
            reference.table, reference.column
        ))
        .bind(id)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| {
            format!(
                "Failed to count references in {}.{}",
                reference.table, reference.column
            )
        })?;
        total += count;
    }
    Ok(total)
}

async fn fetch_name(conn: &mut SqliteConnection, set: &ReferenceSet, id: &str) -> Result<Option<String>> {
    let name = sqlx::query_scalar(&format!(
        "SELECT {} FROM {} WHERE {} = ?",
        set.name_column, set.table, set.id_column
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("Failed to read {} row '{}'", set.table, id))?;
    Ok(name)
}

/// Reference count for every given id, in order
pub async fn reference_counts(
    pool: &SqlitePool,
    set: &ReferenceSet,
    ids: &[String],
) -> Result<Vec<(String, i64)>> {
    set.validate()?;
    let mut conn = pool.acquire().await.context("Failed to acquire connection")?;

    let mut counts = Vec::with_capacity(ids.len());
    for id in ids {
        counts.push((id.clone(), count_references(&mut conn, set, id).await?));
    }
    Ok(counts)
}

/// Group rows sharing a display name (case and whitespace insensitive)
///
/// The canonical row of a group is the one with the most references; ties go
/// to the smallest id.
pub async fn find_duplicate_groups(pool: &SqlitePool, set: &ReferenceSet) -> Result<Vec<DuplicateGroup>> {
    set.validate()?;
    let mut conn = pool.acquire().await.context("Failed to acquire connection")?;

    let rows = sqlx::query(&format!(
        "SELECT CAST({id} AS TEXT) AS id, {name} AS name FROM {table} ORDER BY {id}",
        id = set.id_column,
        name = set.name_column,
        table = set.table
    ))
    .fetch_all(&mut *conn)
    .await
    .with_context(|| format!("Failed to list {}", set.table))?;

    let mut by_name: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for row in rows {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        by_name.entry(normalize_label(&name)).or_default().push((id, name));
    }

    let mut groups = Vec::new();
    for members in by_name.into_values().filter(|m| m.len() > 1) {
        let mut counted = Vec::with_capacity(members.len());
        for (id, name) in members {
            let count = count_references(&mut conn, set, &id).await?;
            counted.push((id, name, count));
        }
        // Most references first, then smallest id
        counted.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| compare_ids(&a.0, &b.0)));

        let (canonical_id, name, _) = counted[0].clone();
        groups.push(DuplicateGroup {
            name,
            canonical_id,
            duplicate_ids: counted[1..].iter().map(|(id, _, _)| id.clone()).collect(),
            reference_counts: counted.iter().map(|(id, _, c)| (id.clone(), *c)).collect(),
        });
    }

    Ok(groups)
}

/// Integer keys compare numerically, anything else as text
fn compare_ids(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => a.cmp(b),
    }
}

/// Re-point references from duplicates to the canonical row and delete the
/// duplicates, in one transaction
///
/// Duplicates that no longer exist are skipped, so a retry after success
/// changes nothing. Every update is issued before any delete.
pub async fn merge_duplicate_rows(
    pool: &SqlitePool,
    set: &ReferenceSet,
    canonical_id: &str,
    duplicate_ids: &[String],
) -> Result<MergeOutcome> {
    set.validate()?;
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let canonical_name = fetch_name(&mut *tx, set, canonical_id)
        .await?
        .ok_or_else(|| MergeError::CanonicalMissing {
            table: set.table.clone(),
            id: canonical_id.to_string(),
        })?;

    let mut present = Vec::new();
    for id in duplicate_ids.iter().filter(|id| id.as_str() != canonical_id) {
        let Some(name) = fetch_name(&mut *tx, set, id).await? else {
            log::debug!("{} row '{}' already gone, skipping", set.table, id);
            continue;
        };
        if normalize_label(&name) != normalize_label(&canonical_name) {
            return Err(MergeError::NameMismatch {
                id: id.clone(),
                name,
                canonical_name,
            }
            .into());
        }
        present.push(id.clone());
    }

    let mut outcome = MergeOutcome::default();

    for reference in &set.references {
        for id in &present {
            let result = sqlx::query(&format!(
                "UPDATE {} SET {} = ? WHERE {} = ?",
                reference.table, reference.column, reference.column
            ))
            .bind(canonical_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .with_context(|| {
                format!(
                    "Failed to re-point {}.{} from '{}'",
                    reference.table, reference.column, id
                )
            })?;
            outcome.repointed += result.rows_affected();
        }
    }

    for id in &present {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE {} = ?",
            set.table, set.id_column
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to delete {} row '{}'", set.table, id))?;
        outcome.deleted += result.rows_affected();
    }

    tx.commit().await.context("Failed to commit transaction")?;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::repository::migrations::connect_memory;
    use crate::ingest::reconcile::ForeignKeyColumn;

    async fn insert_shift(pool: &SqlitePool, id: &str, name: &str) {
        sqlx::query("INSERT INTO shifts (id, name) VALUES (?, ?)")
            .bind(id)
            .bind(name)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn insert_manning(pool: &SqlitePool, shift_id: &str, rows: usize) {
        for i in 0..rows {
            sqlx::query("INSERT INTO shift_manning (shift_id, work_date, operators) VALUES (?, ?, ?)")
                .bind(shift_id)
                .bind("2025-01-06")
                .bind(i as i64 % 4)
                .execute(pool)
                .await
                .unwrap();
        }
    }

    async fn manning_count(pool: &SqlitePool, shift_id: &str) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM shift_manning WHERE shift_id = ?")
            .bind(shift_id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn shift_exists(pool: &SqlitePool, id: &str) -> bool {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shifts WHERE id = ?)")
            .bind(id)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn seeded() -> SqlitePool {
        let pool = connect_memory().await;
        insert_shift(&pool, "A", "Second").await;
        insert_shift(&pool, "B", "second ").await;
        insert_shift(&pool, "C", "First").await;
        insert_manning(&pool, "A", 150).await;
        insert_manning(&pool, "B", 20).await;
        insert_manning(&pool, "C", 5).await;
        pool
    }

    #[tokio::test]
    async fn test_find_duplicate_groups() {
        let pool = seeded().await;

        let groups = find_duplicate_groups(&pool, &ReferenceSet::shifts()).await.unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical_id, "A");
        assert_eq!(groups[0].name, "Second");
        assert_eq!(groups[0].duplicate_ids, vec!["B".to_string()]);
        assert_eq!(
            groups[0].reference_counts,
            vec![("A".to_string(), 150), ("B".to_string(), 20)]
        );
    }

    #[tokio::test]
    async fn test_merge_duplicate_shift() {
        let pool = seeded().await;
        let set = ReferenceSet::shifts();

        let outcome = merge_duplicate_rows(&pool, &set, "A", &["B".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome, MergeOutcome { repointed: 20, deleted: 1 });
        assert_eq!(manning_count(&pool, "A").await, 170);
        assert_eq!(manning_count(&pool, "B").await, 0);
        assert!(!shift_exists(&pool, "B").await);
        assert_eq!(manning_count(&pool, "C").await, 5);

        // Retrying is a no-op
        let retry = merge_duplicate_rows(&pool, &set, "A", &["B".to_string()])
            .await
            .unwrap();
        assert!(retry.is_noop());
        assert_eq!(manning_count(&pool, "A").await, 170);
    }

    #[tokio::test]
    async fn test_merge_rejects_missing_canonical() {
        let pool = seeded().await;

        let err = merge_duplicate_rows(&pool, &ReferenceSet::shifts(), "Z", &["B".to_string()])
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<MergeError>(),
            Some(&MergeError::CanonicalMissing {
                table: "shifts".into(),
                id: "Z".into()
            })
        );
        assert_eq!(manning_count(&pool, "B").await, 20);
    }

    #[tokio::test]
    async fn test_merge_rejects_different_names() {
        let pool = seeded().await;

        let err = merge_duplicate_rows(&pool, &ReferenceSet::shifts(), "A", &["C".to_string()])
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<MergeError>(),
            Some(MergeError::NameMismatch { .. })
        ));
        assert!(shift_exists(&pool, "C").await);
        assert_eq!(manning_count(&pool, "C").await, 5);
    }

    #[tokio::test]
    async fn test_failed_merge_rolls_back() {
        let pool = seeded().await;
        let mut set = ReferenceSet::shifts();
        set.references.push(ForeignKeyColumn {
            table: "shift_manning".into(),
            column: "no_such_column".into(),
        });

        assert!(merge_duplicate_rows(&pool, &set, "A", &["B".to_string()]).await.is_err());

        assert_eq!(manning_count(&pool, "B").await, 20);
        assert!(shift_exists(&pool, "B").await);
    }

    #[tokio::test]
    async fn test_reference_counts() {
        let pool = seeded().await;

        let counts = reference_counts(&pool, &ReferenceSet::shifts(), &["C".into(), "A".into()])
            .await
            .unwrap();
        assert_eq!(counts, vec![("C".to_string(), 5), ("A".to_string(), 150)]);
    }

    async fn integer_keyed_crews() -> (SqlitePool, ReferenceSet) {
        let pool = connect_memory().await;
        for statement in [
            "CREATE TABLE crews (id INTEGER PRIMARY KEY, name TEXT NOT NULL)",
            "CREATE TABLE crew_hours (id INTEGER PRIMARY KEY, crew_id INTEGER REFERENCES crews(id), hours REAL)",
            "INSERT INTO crews (id, name) VALUES (2, 'Second'), (9, 'Night'), (10, 'second')",
            "INSERT INTO crew_hours (crew_id, hours) VALUES (2, 8.0), (10, 7.5), (9, 8.0)",
        ] {
            sqlx::query(statement).execute(&pool).await.unwrap();
        }

        let set = ReferenceSet {
            name: "crews".into(),
            table: "crews".into(),
            id_column: "id".into(),
            name_column: "name".into(),
            references: vec![ForeignKeyColumn {
                table: "crew_hours".into(),
                column: "crew_id".into(),
            }],
        };
        (pool, set)
    }

    #[tokio::test]
    async fn test_integer_keyed_reference_table() {
        let (pool, set) = integer_keyed_crews().await;

        let groups = find_duplicate_groups(&pool, &set).await.unwrap();

        // Equal reference counts: 2 sorts before 10
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].canonical_id, "2");
        assert_eq!(groups[0].duplicate_ids, vec!["10".to_string()]);

        let outcome = merge_duplicate_rows(&pool, &set, "2", &groups[0].duplicate_ids)
            .await
            .unwrap();
        assert_eq!(outcome, MergeOutcome { repointed: 1, deleted: 1 });

        let on_canonical: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crew_hours WHERE crew_id = 2")
            .fetch_one(&pool)
            .await
            .unwrap();
        let crews: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM crews")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(on_canonical, 2);
        assert_eq!(crews, 2);
    }
}
