//! Core types for spreadsheet ingestion

mod cell;
mod machine;
mod record;
mod schedule;
mod sheet;

pub use cell::*;
pub use machine::*;
pub use record::*;
pub use schedule::*;
pub use sheet::*;
