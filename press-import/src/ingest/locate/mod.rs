//! Structure discovery inside loosely shaped sheets
//!
//! Row numbers drift between workbook versions, so the anchor row is found by
//! scanning with a `RowLocator`, and data columns are cut into fixed-stride
//! week groups relative to it.

mod block;
mod strategy;

pub use block::*;
pub use strategy::*;
