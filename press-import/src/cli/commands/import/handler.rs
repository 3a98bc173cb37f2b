//! Import command handler

use anyhow::{Result, bail};
use colored::*;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::ImportCommands;
use crate::cli::commands::{open_database, percent};
use crate::config::Config;
use crate::config::repository::{machines, runs};
use crate::ingest::excel::read_workbook;
use crate::ingest::pipeline::ImportPipeline;
use crate::ingest::reconcile::{ConcurrencyLimiter, SqliteStore, StagedRecord, Upserter};
use crate::ingest::report::{ImportReport, Severity};
use crate::ingest::types::MachineProfile;

/// Handle the import command
pub async fn handle_import_command(args: ImportCommands, config: &Config) -> Result<()> {
    if !args.file.exists() {
        bail!("Workbook does not exist: {}", args.file.display());
    }

    let pipeline = ImportPipeline::from_config(config, args.layout.as_deref())?;
    let start = Instant::now();
    let sheets = read_workbook(&args.file)?;
    let mut report = ImportReport::new(args.file.display().to_string());

    if args.dry_run {
        let records = pipeline
            .run::<SqliteStore>(&sheets, None, &mut report)
            .await;
        print_records(&records, &pipeline);
    } else {
        let pool = open_database(config).await?;
        let profiles: Vec<MachineProfile> = pipeline.machines().iter().cloned().collect();
        machines::sync_machines(&pool, &profiles).await?;

        let store = Arc::new(SqliteStore::new(pool.clone()).with_run_id(report.run_id));
        let upserter = Upserter::new(store, ConcurrencyLimiter::new(config.import.max_in_flight))
            .with_max_consecutive_failures(config.import.max_consecutive_failures);

        pipeline.run(&sheets, Some(&upserter), &mut report).await;

        let stats = upserter.limiter().stats();
        log::debug!(
            "Writes: {} acquired, {:.0}% waited for a permit",
            stats.writes_acquired,
            stats.wait_rate() * 100.0
        );

        runs::record_import_run(&pool, &report).await?;
    }

    print_report(&report, start.elapsed());

    if report.failed > 0 || report.aborted > 0 {
        bail!(
            "{} records failed and {} were not attempted; re-run the import once storage is healthy",
            report.failed,
            report.aborted
        );
    }
    Ok(())
}

/// Print what a dry run would write
fn print_records(records: &[StagedRecord], pipeline: &ImportPipeline) {
    if records.is_empty() {
        println!("{}", "No weekly records found".yellow());
        return;
    }

    println!(
        "{:<12} {:<12} {:>10} {:>10} {:>8}  {}",
        "Machine".bold(),
        "Week".bold(),
        "Total".bold(),
        "Average".bold(),
        "Eff".bold(),
        "Source".bold()
    );
    for staged in records {
        let record = &staged.record;
        let efficiency = pipeline
            .machines()
            .get(&record.machine_id)
            .and_then(|m| record.efficiency(m.target_rate));
        println!(
            "{:<12} {:<12} {:>10.0} {:>10.1} {:>8}  {}",
            record.machine_id,
            record.week_start.to_string(),
            record.total,
            record.average,
            percent(efficiency),
            staged.source.to_string().dimmed()
        );
    }
    println!();
}

fn print_report(report: &ImportReport, elapsed: Duration) {
    let title = if report.dry_run {
        "Dry run complete".cyan().bold()
    } else {
        "Import complete".green().bold()
    };
    println!("{} in {:.2}s", title, elapsed.as_secs_f64());
    println!("  Run:      {}", report.run_id.to_string().dimmed());
    println!(
        "  Sheets:   {} processed, {} skipped",
        report.sheets_processed, report.sheets_skipped
    );
    println!(
        "  Groups:   {} staged, {} empty, {} skipped",
        report.groups_staged, report.empty_groups, report.skipped_groups
    );
    if !report.dry_run {
        println!(
            "  Records:  {} inserted, {} replaced, {} failed, {} aborted",
            report.inserted.to_string().green(),
            report.replaced.to_string().cyan(),
            report.failed.to_string().red(),
            report.aborted.to_string().red()
        );
    }

    if report.diagnostics.is_empty() {
        return;
    }

    println!();
    println!(
        "{} ({} warnings, {} errors)",
        "Diagnostics".bold(),
        report.warnings().count(),
        report.errors().count()
    );
    for diagnostic in &report.diagnostics {
        let line = diagnostic.to_string();
        match diagnostic.severity {
            Severity::Warning => println!("  {} {}", "warn ".yellow(), line),
            Severity::Error => println!("  {} {}", "error".red(), line),
        }
    }
}
