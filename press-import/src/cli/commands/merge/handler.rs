//! Merge-duplicates command handler

use anyhow::{Result, bail};
use colored::*;
use dialoguer::Confirm;

use super::MergeCommands;
use crate::cli::commands::open_database;
use crate::config::Config;
use crate::config::repository::references;
use crate::ingest::reconcile::{ReferenceStore, SqliteStore, merge_duplicate_reference_rows};

/// One canonical row and the rows to fold into it
struct MergePlan {
    canonical_id: String,
    duplicate_ids: Vec<String>,
    reference_counts: Vec<(String, i64)>,
}

/// Handle the merge-duplicates command
pub async fn handle_merge_command(args: MergeCommands, config: &Config) -> Result<()> {
    let Some(set) = config.reference_set(&args.set) else {
        bail!("Unknown reference set '{}'", args.set);
    };

    let pool = open_database(config).await?;
    let store = SqliteStore::new(pool.clone());

    let plans = match args.canonical {
        Some(canonical_id) => {
            if args.duplicate.is_empty() {
                bail!("--canonical needs at least one --duplicate");
            }
            let mut ids = vec![canonical_id.clone()];
            ids.extend(args.duplicate.iter().cloned());
            let reference_counts = references::reference_counts(&pool, &set, &ids).await?;
            vec![MergePlan {
                canonical_id,
                duplicate_ids: args.duplicate,
                reference_counts,
            }]
        }
        None => store
            .find_duplicate_groups(&set)
            .await?
            .into_iter()
            .map(|group| MergePlan {
                canonical_id: group.canonical_id,
                duplicate_ids: group.duplicate_ids,
                reference_counts: group.reference_counts,
            })
            .collect(),
    };

    if plans.is_empty() {
        println!("No duplicate rows in {}", set.table.bold());
        return Ok(());
    }

    for plan in plans {
        println!(
            "{} keep {}, fold in {}",
            set.table.bold(),
            plan.canonical_id.green(),
            plan.duplicate_ids.join(", ").yellow()
        );
        for (id, count) in &plan.reference_counts {
            println!("  {:<20} {} references", id, count);
        }

        if !args.yes {
            let confirm = Confirm::new()
                .with_prompt(format!("Merge into '{}'?", plan.canonical_id))
                .default(false)
                .interact()
                .unwrap_or(false);

            if !confirm {
                println!("  {}", "Skipped".dimmed());
                continue;
            }
        }

        let outcome =
            merge_duplicate_reference_rows(&store, &set, &plan.canonical_id, &plan.duplicate_ids)
                .await?;
        if outcome.is_noop() {
            println!("  {}", "Nothing to merge".dimmed());
        } else {
            println!(
                "  {} re-pointed {} references, deleted {} rows",
                "Merged".green(),
                outcome.repointed,
                outcome.deleted
            );
        }
    }

    Ok(())
}
