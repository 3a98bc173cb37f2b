//! Import command

mod handler;

pub use handler::*;

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ImportCommands {
    /// Workbook to import (.xlsx, .xlsm, .xls or .ods)
    pub file: PathBuf,

    /// Only use the named layout
    #[arg(long)]
    pub layout: Option<String>,

    /// Parse and aggregate without writing to the database
    #[arg(long)]
    pub dry_run: bool,
}
