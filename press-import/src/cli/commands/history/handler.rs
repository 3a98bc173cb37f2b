//! History command handler

use anyhow::Result;
use colored::*;

use super::HistoryCommands;
use crate::cli::commands::open_database;
use crate::config::Config;
use crate::config::repository::runs;

/// Handle the history command
pub async fn handle_history_command(args: HistoryCommands, config: &Config) -> Result<()> {
    let pool = open_database(config).await?;
    let history = runs::list_import_runs(&pool, args.limit).await?;

    if history.is_empty() {
        println!("No imports recorded yet");
        return Ok(());
    }

    for run in history {
        let status = if run.errors > 0 || run.failed > 0 {
            "errors".red()
        } else if run.warnings > 0 {
            "warnings".yellow()
        } else {
            "ok".green()
        };
        println!(
            "{}  {}  {} inserted, {} replaced, {} failed  [{}]",
            run.started_at.format("%Y-%m-%d %H:%M"),
            run.source.bold(),
            run.inserted,
            run.replaced,
            run.failed,
            status
        );
        println!("  {}", run.id.dimmed());
    }

    Ok(())
}
