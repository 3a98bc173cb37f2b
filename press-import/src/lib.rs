//! Weekly press production import
//!
//! Reads loosely structured production workbooks, turns each machine's
//! week of daily hit counts into a `WeeklyRecord`, and upserts the records
//! into a SQLite metrics database keyed by (machine, week).

pub mod cli;
pub mod config;
pub mod ingest;
