//! Merge records that share a natural key within one import batch

use std::collections::HashMap;

use crate::ingest::error::Warning;
use crate::ingest::report::{Diagnostic, SourceLocation};
use crate::ingest::types::{NaturalKey, WeeklyRecord};

/// A record waiting to be written, with where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct StagedRecord {
    pub record: WeeklyRecord,
    pub source: SourceLocation,
}

/// Records with unique keys plus anything worth telling the operator
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// One record per natural key, in first-seen order
    pub records: Vec<StagedRecord>,
    pub diagnostics: Vec<Diagnostic>,
    /// Number of staged records folded into an earlier one
    pub merged: usize,
}

/// Collapse staged records to one per natural key
///
/// Rows are merged in file order, day by day: a later reported day replaces
/// the earlier value, a later blank day never erases one. A later sheet total
/// replaces an earlier one. Rows that disagree on a day both reported raise a
/// `DuplicateKeyConflict`.
pub fn reconcile_batch(staged: Vec<StagedRecord>, tolerance: f64) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    let mut index: HashMap<NaturalKey, usize> = HashMap::new();

    for incoming in staged {
        let key = incoming.record.key();
        let Some(&pos) = index.get(&key) else {
            index.insert(key, outcome.records.len());
            outcome.records.push(incoming);
            continue;
        };

        let existing = &mut outcome.records[pos];
        let settled_before = (existing.record.total, existing.record.total_source);
        let conflict = merge_days(&mut existing.record, &incoming.record);
        outcome.merged += 1;

        if conflict {
            let warning = Warning::DuplicateKeyConflict {
                machine_id: key.machine_id.clone(),
                week_start: key.week_start,
                first: existing.source.to_string(),
                second: incoming.source.to_string(),
            };
            outcome.diagnostics.push(
                Diagnostic::warning((&warning).into(), warning.to_string())
                    .at(&incoming.source)
                    .for_key(&key),
            );
        } else {
            log::debug!(
                "Merged duplicate rows for {} ({} and {})",
                key,
                existing.source,
                incoming.source
            );
        }

        let warning = existing.record.settle_totals(tolerance);
        let settled_after = (existing.record.total, existing.record.total_source);
        // Each staged row already reported its own mismatch
        if let Some(warning) = warning.filter(|_| settled_after != settled_before) {
            outcome.diagnostics.push(
                Diagnostic::warning((&warning).into(), warning.to_string())
                    .at(&incoming.source)
                    .for_key(&key),
            );
        }
        existing.source = incoming.source;
    }

    outcome
}

/// Fold `later` into `earlier`; returns true when both reported different values
fn merge_days(earlier: &mut WeeklyRecord, later: &WeeklyRecord) -> bool {
    let mut conflict = false;

    for (kept, incoming) in earlier.days.iter_mut().zip(later.days.iter()) {
        if !incoming.status.is_reported() {
            continue;
        }
        if kept.status.is_reported() && kept.count != incoming.count {
            conflict = true;
        }
        *kept = incoming.clone();
    }

    if let Some(total) = later.explicit_total {
        if matches!(earlier.explicit_total, Some(prev) if prev != total) {
            conflict = true;
        }
        earlier.explicit_total = Some(total);
    }

    conflict
}
