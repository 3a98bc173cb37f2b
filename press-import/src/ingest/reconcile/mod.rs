//! Reconciling imported records with storage

mod batch;
mod concurrency;
mod merge;
mod store;
mod upsert;

pub use batch::*;
pub use concurrency::*;
pub use merge::*;
pub use store::*;
pub use upsert::*;
