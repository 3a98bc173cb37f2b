//! Repository layer for database operations

pub mod machines;
pub mod migrations;
pub mod references;
pub mod runs;
pub mod weekly;
