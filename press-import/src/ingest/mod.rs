//! Spreadsheet ingestion, weekly aggregation and storage reconciliation

pub mod aggregate;
pub mod error;
pub mod excel;
pub mod locate;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod types;
