//! History command

mod handler;

pub use handler::*;

use clap::Args;

#[derive(Args, Debug)]
pub struct HistoryCommands {
    /// Number of runs to list
    #[arg(short, long, default_value = "10")]
    pub limit: usize,
}
