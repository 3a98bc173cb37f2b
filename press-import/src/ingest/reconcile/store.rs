//! Storage seams used by the reconciler

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use uuid::Uuid;

use super::merge::{DuplicateGroup, MergeOutcome, ReferenceSet};
use super::upsert::UpsertOutcome;
use crate::config::repository::{references, weekly};
use crate::ingest::types::{NaturalKey, WeeklyRecord};

/// Keyed storage for weekly records
#[async_trait]
pub trait WeeklyStore: Send + Sync {
    async fn fetch_weekly(&self, key: &NaturalKey) -> Result<Option<WeeklyRecord>>;

    /// Insert the record, or fully replace the one stored under its key
    async fn upsert_weekly(&self, record: &WeeklyRecord) -> Result<UpsertOutcome>;
}

/// Reference tables that may hold duplicate rows
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn find_duplicate_groups(&self, set: &ReferenceSet) -> Result<Vec<DuplicateGroup>>;

    async fn merge_duplicates(
        &self,
        set: &ReferenceSet,
        canonical_id: &str,
        duplicate_ids: &[String],
    ) -> Result<MergeOutcome>;
}

/// SQLite-backed store
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    run_id: Option<Uuid>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool, run_id: None }
    }

    /// Tag every written record with the run that wrote it
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.run_id = Some(run_id);
        self
    }
}

#[async_trait]
impl WeeklyStore for SqliteStore {
    async fn fetch_weekly(&self, key: &NaturalKey) -> Result<Option<WeeklyRecord>> {
        weekly::get_weekly(&self.pool, key).await
    }

    async fn upsert_weekly(&self, record: &WeeklyRecord) -> Result<UpsertOutcome> {
        weekly::upsert_weekly(&self.pool, record, self.run_id).await
    }
}

#[async_trait]
impl ReferenceStore for SqliteStore {
    async fn find_duplicate_groups(&self, set: &ReferenceSet) -> Result<Vec<DuplicateGroup>> {
        references::find_duplicate_groups(&self.pool, set).await
    }

    async fn merge_duplicates(
        &self,
        set: &ReferenceSet,
        canonical_id: &str,
        duplicate_ids: &[String],
    ) -> Result<MergeOutcome> {
        references::merge_duplicate_rows(&self.pool, set, canonical_id, duplicate_ids).await
    }
}
