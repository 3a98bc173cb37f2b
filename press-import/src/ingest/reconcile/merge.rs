//! Duplicate reference row reconciliation
//!
//! Reference tables (shifts, for instance) sometimes end up with two rows
//! for the same thing, e.g. two shifts both named "Second". Every row that
//! points at a duplicate is re-pointed at the canonical row, then the
//! duplicates are deleted, all in one transaction.

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::store::ReferenceStore;
use crate::ingest::error::MergeError;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// A column holding ids of a reference table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyColumn {
    pub table: String,
    pub column: String,
}

/// A reference table and every column that points into it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSet {
    /// Name used on the command line
    pub name: String,
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_name_column")]
    pub name_column: String,
    pub references: Vec<ForeignKeyColumn>,
}

fn default_id_column() -> String {
    "id".to_string()
}

fn default_name_column() -> String {
    "name".to_string()
}

impl ReferenceSet {
    /// Built-in set for the `shifts` table
    pub fn shifts() -> Self {
        ReferenceSet {
            name: "shifts".to_string(),
            table: "shifts".to_string(),
            id_column: default_id_column(),
            name_column: default_name_column(),
            references: vec![ForeignKeyColumn {
                table: "shift_manning".to_string(),
                column: "shift_id".to_string(),
            }],
        }
    }

    /// Every table and column name must be a plain SQL identifier, since they
    /// are interpolated into statements
    pub fn validate(&self) -> Result<(), MergeError> {
        let names = [&self.table, &self.id_column, &self.name_column]
            .into_iter()
            .chain(self.references.iter().flat_map(|r| [&r.table, &r.column]));
        for name in names {
            if !IDENTIFIER.is_match(name) {
                return Err(MergeError::InvalidIdentifier(name.clone()));
            }
        }
        Ok(())
    }
}

/// Rows sharing a display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    /// Display name of the canonical row
    pub name: String,
    pub canonical_id: String,
    pub duplicate_ids: Vec<String>,
    /// Reference count per id, canonical first
    pub reference_counts: Vec<(String, i64)>,
}

/// What a merge changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    /// Foreign-key values re-pointed at the canonical id
    pub repointed: u64,
    /// Duplicate rows deleted
    pub deleted: u64,
}

impl MergeOutcome {
    pub fn is_noop(&self) -> bool {
        self.repointed == 0 && self.deleted == 0
    }
}

/// Re-point references from `duplicate_ids` to `canonical_id`, then delete
/// the duplicates. Retrying a completed merge changes nothing.
pub async fn merge_duplicate_reference_rows<S: ReferenceStore + ?Sized>(
    store: &S,
    set: &ReferenceSet,
    canonical_id: &str,
    duplicate_ids: &[String],
) -> Result<MergeOutcome> {
    set.validate()?;

    let duplicates: Vec<String> = duplicate_ids
        .iter()
        .filter(|id| id.as_str() != canonical_id)
        .cloned()
        .collect();
    if duplicates.is_empty() {
        return Ok(MergeOutcome::default());
    }

    let outcome = store.merge_duplicates(set, canonical_id, &duplicates).await?;
    if outcome.is_noop() {
        log::info!(
            "{}: nothing to merge into '{}' (already merged?)",
            set.table,
            canonical_id
        );
    } else {
        log::info!(
            "{}: re-pointed {} references to '{}' and deleted {} duplicate rows",
            set.table,
            outcome.repointed,
            canonical_id,
            outcome.deleted
        );
    }
    Ok(outcome)
}
