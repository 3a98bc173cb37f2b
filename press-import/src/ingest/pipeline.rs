//! Sheet-to-storage import pipeline
//!
//! Sheets are staged synchronously (locate, extract, aggregate), the staged
//! records are de-duplicated per natural key, then written through the
//! upserter. Every skipped sheet or group leaves a diagnostic in the report.

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use std::collections::HashMap;

use crate::config::{CompiledLayout, Config};
use crate::ingest::aggregate::WeeklyAggregator;
use crate::ingest::error::IngestError;
use crate::ingest::locate::{
    ColumnGroup, extract_cell_range, find_machine_rows, has_production_data, locate_data_block,
    locate_row, resolve_week_start,
};
use crate::ingest::reconcile::{StagedRecord, Upserter, WeeklyStore, reconcile_batch};
use crate::ingest::report::{Diagnostic, DiagnosticKind, ImportReport, SourceLocation};
use crate::ingest::types::{CellValue, DAYS_PER_WEEK, MachineRegistry, NaturalKey, RawSheet};

/// Turns workbook sheets into stored weekly records
#[derive(Debug)]
pub struct ImportPipeline {
    layouts: Vec<CompiledLayout>,
    machines: MachineRegistry,
    aggregator: WeeklyAggregator,
    scan_window: usize,
}

impl ImportPipeline {
    pub fn new(
        layouts: Vec<CompiledLayout>,
        machines: MachineRegistry,
        aggregator: WeeklyAggregator,
        scan_window: usize,
    ) -> Self {
        ImportPipeline {
            layouts,
            machines,
            aggregator,
            scan_window,
        }
    }

    /// Build from configuration, optionally restricted to one named layout
    pub fn from_config(config: &Config, layout: Option<&str>) -> Result<Self> {
        let machines = config.machine_registry()?;
        if machines.is_empty() {
            bail!("No machines configured; add [[machines]] entries to the config file");
        }

        let mut layouts = Vec::new();
        for candidate in config.layouts() {
            if layout.is_some_and(|name| name != candidate.name) {
                continue;
            }
            layouts.push(candidate.compile()?);
        }
        if let (Some(name), true) = (layout, layouts.is_empty()) {
            bail!("Unknown layout '{}'", name);
        }

        let aggregator =
            WeeklyAggregator::new(config.schedule.clone(), config.import.total_tolerance);
        Ok(ImportPipeline::new(
            layouts,
            machines,
            aggregator,
            config.import.scan_window,
        ))
    }

    pub fn machines(&self) -> &MachineRegistry {
        &self.machines
    }

    /// Locate, extract and aggregate every sheet; nothing is written
    pub fn stage(&self, sheets: &[RawSheet], report: &mut ImportReport) -> Vec<StagedRecord> {
        let mut staged = Vec::new();

        for sheet in sheets {
            let Some(layout) = self.layouts.iter().find(|l| l.applies_to(&sheet.name)) else {
                log::info!("Sheet '{}' matches no layout, skipping", sheet.name);
                report.sheets_skipped += 1;
                continue;
            };

            match self.stage_sheet(sheet, layout, report) {
                Some(records) => {
                    report.sheets_processed += 1;
                    staged.extend(records);
                }
                None => report.sheets_skipped += 1,
            }
        }

        staged
    }

    /// Stage one sheet; `None` when the sheet had to be skipped
    fn stage_sheet(
        &self,
        sheet: &RawSheet,
        layout: &CompiledLayout,
        report: &mut ImportReport,
    ) -> Option<Vec<StagedRecord>> {
        let geometry = &layout.layout;

        let anchor_row = match locate_row(sheet, layout.locator(), self.scan_window) {
            Ok(row) => row,
            Err(e) => match geometry.fallback_header_row {
                Some(row) => {
                    report.push(
                        Diagnostic::warning(
                            DiagnosticKind::HeaderFallback,
                            format!("{}; using configured header row {}", e, row + 1),
                        )
                        .in_sheet(&sheet.name),
                    );
                    row
                }
                None => {
                    report.push(Diagnostic::error((&e).into(), e.to_string()).in_sheet(&sheet.name));
                    return None;
                }
            },
        };
        log::debug!(
            "Sheet '{}' ({}): header at row {}",
            sheet.name,
            layout.name(),
            anchor_row + 1
        );

        let groups = locate_data_block(
            sheet,
            anchor_row,
            geometry.column_stride,
            geometry.first_group_column,
        );
        let week_starts: Vec<Result<NaiveDate, IngestError>> = groups
            .iter()
            .map(|group| resolve_week_start(sheet, anchor_row, group, geometry.first_week_start))
            .collect();

        let rows = find_machine_rows(sheet, anchor_row, geometry.label_column, &self.machines);
        if rows.is_empty() {
            log::warn!("Sheet '{}' has no rows for configured machines", sheet.name);
        }
        log::debug!(
            "Sheet '{}': {} machine rows x {} week groups",
            sheet.name,
            rows.len(),
            groups.len()
        );

        let mut staged = Vec::new();
        for machine_row in &rows {
            let location = SourceLocation {
                sheet: sheet.name.clone(),
                row: machine_row.row,
            };

            for (group, week_start) in groups.iter().zip(&week_starts) {
                let (days, total) = self.group_cells(sheet, machine_row.row, group, layout);

                if !has_production_data(&days) {
                    report.empty_groups += 1;
                    continue;
                }

                let week_start = match week_start {
                    Ok(date) => *date,
                    Err(e) => {
                        report.skipped_groups += 1;
                        report.push(
                            Diagnostic::error(e.into(), e.to_string())
                                .at(&location)
                                .for_machine(&machine_row.machine.id),
                        );
                        continue;
                    }
                };

                match self.aggregator.aggregate(
                    machine_row.machine,
                    week_start,
                    &days,
                    total.as_ref(),
                ) {
                    Ok(aggregation) => {
                        let key = aggregation.record.key();
                        for warning in &aggregation.warnings {
                            report.push(
                                Diagnostic::warning(warning.into(), warning.to_string())
                                    .at(&location)
                                    .for_key(&key),
                            );
                        }
                        report.groups_staged += 1;
                        staged.push(StagedRecord {
                            record: aggregation.record,
                            source: location.clone(),
                        });
                    }
                    Err(e) => {
                        report.skipped_groups += 1;
                        let mut diagnostic = Diagnostic::error((&e).into(), e.to_string())
                            .at(&location)
                            .for_machine(&machine_row.machine.id);
                        diagnostic.week_start = Some(week_start);
                        report.push(diagnostic);
                    }
                }
            }
        }

        Some(staged)
    }

    /// Day cells (up to seven, fewer for a truncated group) and the total cell
    fn group_cells(
        &self,
        sheet: &RawSheet,
        row: usize,
        group: &ColumnGroup,
        layout: &CompiledLayout,
    ) -> (Vec<CellValue>, Option<CellValue>) {
        let geometry = &layout.layout;
        let available = group
            .width
            .saturating_sub(geometry.day_offset)
            .min(DAYS_PER_WEEK);
        let days = extract_cell_range(sheet, row, group.col_start + geometry.day_offset, available);

        let total = geometry
            .total_offset
            .filter(|offset| *offset < group.width)
            .map(|offset| sheet.cell(row, group.col_start + offset).clone());

        (days, total)
    }

    /// Stage, de-duplicate and, unless `upserter` is `None` (dry run), write
    ///
    /// Returns the de-duplicated records.
    pub async fn run<S: WeeklyStore + ?Sized>(
        &self,
        sheets: &[RawSheet],
        upserter: Option<&Upserter<S>>,
        report: &mut ImportReport,
    ) -> Vec<StagedRecord> {
        let staged = self.stage(sheets, report);
        let batch = reconcile_batch(staged, self.aggregator.total_tolerance());
        for diagnostic in batch.diagnostics {
            report.push(diagnostic);
        }

        let Some(upserter) = upserter else {
            report.dry_run = true;
            report.finish();
            return batch.records;
        };

        let records = batch.records.iter().map(|s| s.record.clone()).collect();
        let summary = upserter.upsert_all(records).await;

        report.inserted = summary.inserted;
        report.replaced = summary.replaced;
        report.failed = summary.failures.len();
        report.aborted = summary.aborted.len();

        let sources: HashMap<NaturalKey, &SourceLocation> = batch
            .records
            .iter()
            .map(|s| (s.record.key(), &s.source))
            .collect();
        let located = |diagnostic: Diagnostic, key: &NaturalKey| match sources.get(key) {
            Some(source) => diagnostic.at(source).for_key(key),
            None => diagnostic.for_key(key),
        };

        for (key, error) in &summary.failures {
            report.push(located(
                Diagnostic::error(DiagnosticKind::StorageFailure, error.clone()),
                key,
            ));
        }
        for key in &summary.aborted {
            report.push(located(
                Diagnostic::error(
                    DiagnosticKind::Aborted,
                    "not written after repeated storage failures",
                ),
                key,
            ));
        }

        log::info!(
            "Import of '{}': {} inserted, {} replaced, {} failed, {} aborted",
            report.source,
            report.inserted,
            report.replaced,
            report.failed,
            report.aborted
        );
        report.finish();
        batch.records
    }
}

/// Read a workbook from disk and stage it
pub fn read_sheets(path: &std::path::Path) -> Result<Vec<RawSheet>> {
    crate::ingest::excel::read_workbook(path)
        .with_context(|| format!("Failed to import {}", path.display()))
}
