//! Machines command

mod handler;

pub use handler::*;

use clap::Args;

#[derive(Args, Debug)]
pub struct MachinesCommands {
    /// Also show how many weeks are stored per machine
    #[arg(long)]
    pub stored: bool,
}
