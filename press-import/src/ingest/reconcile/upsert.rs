//! Idempotent keyed writes of weekly records
//!
//! Writes for distinct natural keys run concurrently, bounded by the write
//! limiter. Writes for the same key run one after another in submission
//! order, so the last submitted record is the one left in storage.

use anyhow::Result;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use super::concurrency::ConcurrencyLimiter;
use super::store::WeeklyStore;
use crate::ingest::types::{NaturalKey, WeeklyRecord};

/// Consecutive storage failures tolerated before abandoning the rest of a run
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: usize = 5;

/// What a single upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Totals for a batch of upserts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertSummary {
    pub inserted: usize,
    pub replaced: usize,
    /// Keys whose write failed, with the storage error
    pub failures: Vec<(NaturalKey, String)>,
    /// Keys never attempted because the run was abandoned
    pub aborted: Vec<NaturalKey>,
}

impl UpsertSummary {
    pub fn written(&self) -> usize {
        self.inserted + self.replaced
    }

    pub fn is_aborted(&self) -> bool {
        !self.aborted.is_empty()
    }

    fn absorb(&mut self, other: UpsertSummary) {
        self.inserted += other.inserted;
        self.replaced += other.replaced;
        self.failures.extend(other.failures);
        self.aborted.extend(other.aborted);
    }
}

/// Shared failure tracking for one `upsert_all` call
#[derive(Debug, Default)]
struct AbortState {
    consecutive_failures: AtomicUsize,
    aborted: AtomicBool,
}

/// Writes weekly records through a `WeeklyStore`
pub struct Upserter<S: ?Sized> {
    store: Arc<S>,
    limiter: ConcurrencyLimiter,
    max_consecutive_failures: usize,
}

impl<S: WeeklyStore + ?Sized> Upserter<S> {
    pub fn new(store: Arc<S>, limiter: ConcurrencyLimiter) -> Self {
        Upserter {
            store,
            limiter,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }

    /// 0 disables the early abort
    pub fn with_max_consecutive_failures(mut self, max: usize) -> Self {
        self.max_consecutive_failures = max;
        self
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Insert the record if its key is new, otherwise replace the stored one
    pub async fn upsert_weekly(&self, record: &WeeklyRecord) -> Result<UpsertOutcome> {
        let _permit = self.limiter.acquire().await;
        self.store.upsert_weekly(record).await
    }

    /// Write every record, keeping per-key submission order
    pub async fn upsert_all(&self, records: Vec<WeeklyRecord>) -> UpsertSummary {
        let chains = chain_by_key(records);
        let state = AbortState::default();

        log::debug!(
            "Writing {} keys with up to {} writes in flight",
            chains.len(),
            self.limiter.max_in_flight()
        );

        let results: Vec<UpsertSummary> = stream::iter(chains)
            .map(|chain| self.run_chain(chain, &state))
            .buffer_unordered(self.limiter.max_in_flight())
            .collect()
            .await;

        let mut summary = UpsertSummary::default();
        for result in results {
            summary.absorb(result);
        }

        if summary.is_aborted() {
            log::error!(
                "Abandoned {} writes after {} consecutive storage failures",
                summary.aborted.len(),
                self.max_consecutive_failures
            );
        }
        summary
    }

    async fn run_chain(&self, chain: Vec<WeeklyRecord>, state: &AbortState) -> UpsertSummary {
        let mut summary = UpsertSummary::default();

        for record in chain {
            if state.aborted.load(Ordering::SeqCst) {
                summary.aborted.push(record.key());
                continue;
            }

            match self.upsert_weekly(&record).await {
                Ok(outcome) => {
                    state.consecutive_failures.store(0, Ordering::SeqCst);
                    log::debug!("{} {:?}", record.key(), outcome);
                    match outcome {
                        UpsertOutcome::Inserted => summary.inserted += 1,
                        UpsertOutcome::Replaced => summary.replaced += 1,
                    }
                }
                Err(e) => {
                    let failures = state.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                    log::warn!("Failed to write {}: {:#}", record.key(), e);
                    summary.failures.push((record.key(), format!("{:#}", e)));

                    if self.max_consecutive_failures > 0 && failures >= self.max_consecutive_failures {
                        state.aborted.store(true, Ordering::SeqCst);
                    }
                }
            }
        }

        summary
    }
}

/// Split records into per-key chains, preserving submission order
fn chain_by_key(records: Vec<WeeklyRecord>) -> Vec<Vec<WeeklyRecord>> {
    let mut index: HashMap<NaturalKey, usize> = HashMap::new();
    let mut chains: Vec<Vec<WeeklyRecord>> = Vec::new();

    for record in records {
        let key = record.key();
        match index.get(&key) {
            Some(&pos) => chains[pos].push(record),
            None => {
                index.insert(key, chains.len());
                chains.push(vec![record]);
            }
        }
    }

    chains
}
