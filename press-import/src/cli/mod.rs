//! Command-line interface

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::history::HistoryCommands;
use commands::import::ImportCommands;
use commands::machines::MachinesCommands;
use commands::merge::MergeCommands;
use commands::show::ShowCommands;

#[derive(Parser, Debug)]
#[command(name = "press-import")]
#[command(version, about = "Import weekly press production figures from spreadsheets")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (default: $PRESS_IMPORT_CONFIG or the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a production workbook
    Import(ImportCommands),
    /// Show stored weeks for a machine
    Show(ShowCommands),
    /// Merge duplicate rows of a reference table
    MergeDuplicates(MergeCommands),
    /// List configured machines
    Machines(MachinesCommands),
    /// List recent import runs
    History(HistoryCommands),
}

/// Log filter for a `-v` count, used when `RUST_LOG` is unset
pub fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_import() {
        let cli = Cli::try_parse_from([
            "press-import",
            "-vv",
            "import",
            "hits.xlsx",
            "--layout",
            "weekly-hits",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Import(args) => {
                assert_eq!(args.file, PathBuf::from("hits.xlsx"));
                assert_eq!(args.layout.as_deref(), Some("weekly-hits"));
                assert!(args.dry_run);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_parse_merge_duplicates() {
        let cli = Cli::try_parse_from([
            "press-import",
            "merge-duplicates",
            "--canonical",
            "A",
            "--duplicate",
            "B",
            "--duplicate",
            "C",
            "--yes",
        ])
        .unwrap();

        match cli.command {
            Commands::MergeDuplicates(args) => {
                assert_eq!(args.set, "shifts");
                assert_eq!(args.canonical.as_deref(), Some("A"));
                assert_eq!(args.duplicate, vec!["B".to_string(), "C".to_string()]);
                assert!(args.yes);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_requires_canonical() {
        assert!(Cli::try_parse_from(["press-import", "merge-duplicates", "--duplicate", "B"]).is_err());
    }

    #[test]
    fn test_default_log_filter() {
        assert_eq!(default_log_filter(0), "warn");
        assert_eq!(default_log_filter(1), "info");
        assert_eq!(default_log_filter(5), "debug");
    }
}
