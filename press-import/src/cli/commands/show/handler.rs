//! Show command handler

use anyhow::Result;
use colored::*;

use super::ShowCommands;
use crate::cli::commands::{open_database, percent};
use crate::config::Config;
use crate::config::repository::weekly;
use crate::ingest::types::{DayStatus, TotalSource, WeeklyRecord};

/// Handle the show command
pub async fn handle_show_command(args: ShowCommands, config: &Config) -> Result<()> {
    let registry = config.machine_registry()?;
    let machine = registry.match_label(&args.machine);
    let machine_id = machine.map(|m| m.id.clone()).unwrap_or(args.machine.clone());

    let pool = open_database(config).await?;
    let records = weekly::list_weekly(&pool, &machine_id, args.weeks).await?;

    if records.is_empty() {
        println!("No weeks stored for {}", machine_id.yellow());
        return Ok(());
    }

    match machine {
        Some(m) => println!("{} {}", m.id.bold(), m.name.dimmed()),
        None => println!("{} {}", machine_id.bold(), "(not in config)".dimmed()),
    }
    println!(
        "{:<12} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>7} {:>9} {:>9} {:>7}",
        "Week", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun", "Total", "Average", "Eff"
    );

    for record in &records {
        let efficiency = machine.and_then(|m| record.efficiency(m.target_rate));
        println!(
            "{:<12} {} {:>9} {:>9.1} {:>7}",
            record.week_start.to_string(),
            day_cells(record),
            total_cell(record),
            record.average,
            percent(efficiency)
        );
    }

    Ok(())
}

fn day_cells(record: &WeeklyRecord) -> String {
    record
        .days
        .iter()
        .map(|day| match day.status {
            DayStatus::NotReported => format!("{:>7}", "."),
            _ => format!("{:>7.0}", day.count),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Totals taken from the sheet are marked with `*`
fn total_cell(record: &WeeklyRecord) -> String {
    match record.total_source {
        TotalSource::Computed => format!("{:.0}", record.total),
        TotalSource::Explicit => format!("{:.0}*", record.total),
    }
}
