//! Workbook reading
//!
//! Every sheet of a workbook is read into a `RawSheet` up front; the rest of
//! the pipeline never touches the file again.

mod reader;

pub use reader::{read_workbook, sheet_from_range};
