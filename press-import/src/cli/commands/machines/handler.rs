//! Machines command handler

use anyhow::Result;
use colored::*;
use std::collections::HashMap;

use super::MachinesCommands;
use crate::cli::commands::open_database;
use crate::config::Config;
use crate::config::repository::machines::{self, MachineSummary};

/// Handle the machines command
pub async fn handle_machines_command(args: MachinesCommands, config: &Config) -> Result<()> {
    let registry = config.machine_registry()?;
    if registry.is_empty() {
        println!("{}", "No machines configured".yellow());
        return Ok(());
    }

    let stored: HashMap<String, MachineSummary> = if args.stored {
        let pool = open_database(config).await?;
        machines::list_machine_summaries(&pool)
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect()
    } else {
        HashMap::new()
    };

    for machine in registry.iter() {
        println!(
            "{:<12} {:<28} {:>8.1}/h",
            machine.id.bold(),
            machine.name,
            machine.target_rate
        );
        if !machine.aliases.is_empty() {
            println!("{:<12} aliases: {}", "", machine.aliases.join(", ").dimmed());
        }
        if args.stored {
            match stored.get(&machine.id) {
                Some(summary) if summary.weeks > 0 => println!(
                    "{:<12} {} weeks stored, latest {}",
                    "",
                    summary.weeks,
                    summary
                        .latest_week
                        .map(|d| d.to_string())
                        .unwrap_or_default()
                ),
                _ => println!("{:<12} {}", "", "no weeks stored".dimmed()),
            }
        }
    }

    Ok(())
}
