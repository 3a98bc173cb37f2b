//! Merge-duplicates command

mod handler;

pub use handler::*;

use clap::Args;

#[derive(Args, Debug)]
pub struct MergeCommands {
    /// Reference set to clean up
    #[arg(long, default_value = "shifts")]
    pub set: String,

    /// Row to keep; without it, duplicate groups are detected by name
    #[arg(long)]
    pub canonical: Option<String>,

    /// Row to fold into the canonical one (repeatable)
    #[arg(long, requires = "canonical")]
    pub duplicate: Vec<String>,

    /// Merge without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}
