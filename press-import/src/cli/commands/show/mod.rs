//! Show command

mod handler;

pub use handler::*;

use clap::Args;

#[derive(Args, Debug)]
pub struct ShowCommands {
    /// Machine id, name or alias
    pub machine: String,

    /// Number of most recent weeks to show
    #[arg(short, long, default_value = "8")]
    pub weeks: usize,
}
