//! Week-group aggregation into canonical weekly records

mod weekly;

pub use weekly::{Aggregation, DEFAULT_TOTAL_TOLERANCE, WeeklyAggregator};
