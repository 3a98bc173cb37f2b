//! Turn seven raw day cells into a `WeeklyRecord`

use chrono::{Duration, NaiveDate};

use crate::ingest::error::{AggregationError, Warning};
use crate::ingest::types::{
    CellValue, DAYS_PER_WEEK, DailyBucket, MachineProfile, OperatingSchedule, WeeklyRecord,
    week_start_of, weekday_at,
};

/// Largest difference between a sheet total and the day sum treated as rounding
pub const DEFAULT_TOTAL_TOLERANCE: f64 = 0.5;

/// Result of aggregating one week group
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub record: WeeklyRecord,
    pub warnings: Vec<Warning>,
}

/// Builds weekly records from located week groups
#[derive(Debug, Clone)]
pub struct WeeklyAggregator {
    schedule: OperatingSchedule,
    total_tolerance: f64,
}

impl Default for WeeklyAggregator {
    fn default() -> Self {
        WeeklyAggregator::new(OperatingSchedule::default(), DEFAULT_TOTAL_TOLERANCE)
    }
}

impl WeeklyAggregator {
    pub fn new(schedule: OperatingSchedule, total_tolerance: f64) -> Self {
        WeeklyAggregator {
            schedule,
            total_tolerance,
        }
    }

    pub fn total_tolerance(&self) -> f64 {
        self.total_tolerance
    }

    /// Aggregate one machine's week
    ///
    /// `raw_values` holds the Monday..Sunday cells (only the first seven are
    /// used). `explicit_total` is the sheet's own weekly total cell, if the
    /// layout has one.
    pub fn aggregate(
        &self,
        machine: &MachineProfile,
        week_start: NaiveDate,
        raw_values: &[CellValue],
        explicit_total: Option<&CellValue>,
    ) -> Result<Aggregation, AggregationError> {
        if raw_values.len() < DAYS_PER_WEEK {
            return Err(AggregationError::IncompleteGroup {
                expected: DAYS_PER_WEEK,
                found: raw_values.len(),
            });
        }

        let week_start = week_start_of(week_start);
        let mut counts: [Option<f64>; DAYS_PER_WEEK] = [None; DAYS_PER_WEEK];

        for (i, cell) in raw_values.iter().take(DAYS_PER_WEEK).enumerate() {
            let day = weekday_at(i);
            let count = cell
                .as_count()
                .map_err(|source| AggregationError::InvalidCell { day, source })?;
            if let Some(value) = count {
                if value < 0.0 {
                    return Err(AggregationError::NegativeValue { day, value });
                }
            }
            counts[i] = count;
        }

        let days: [DailyBucket; DAYS_PER_WEEK] = std::array::from_fn(|i| {
            let date = week_start + Duration::days(i as i64);
            let hours = self.schedule.hours_for(weekday_at(i), counts[i]);
            DailyBucket::new(date, counts[i], hours, machine.target_rate)
        });

        let explicit_total = explicit_total.and_then(|cell| coerce_explicit_total(machine, week_start, cell));

        let (record, warning) =
            WeeklyRecord::new(&machine.id, week_start, days, explicit_total, self.total_tolerance);

        Ok(Aggregation {
            record,
            warnings: warning.into_iter().collect(),
        })
    }
}

/// Sheet totals that are blank, unreadable or negative are ignored
fn coerce_explicit_total(
    machine: &MachineProfile,
    week_start: NaiveDate,
    cell: &CellValue,
) -> Option<f64> {
    match cell.as_count() {
        Ok(Some(total)) if total >= 0.0 => Some(total),
        Ok(Some(total)) => {
            log::warn!(
                "Ignoring negative sheet total {} for {} week of {}",
                total,
                machine.id,
                week_start
            );
            None
        }
        Ok(None) => None,
        Err(e) => {
            log::warn!(
                "Ignoring unreadable sheet total for {} week of {}: {}",
                machine.id,
                week_start,
                e
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::error::CellError;
    use crate::ingest::types::{DayStatus, TotalSource};
    use chrono::Weekday;

    fn press() -> MachineProfile {
        MachineProfile::new("P-1200", "1200 Ton Press", 100.0)
    }

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 6).unwrap()
    }

    fn numbers(values: &[f64]) -> Vec<CellValue> {
        values.iter().map(|v| CellValue::Number(*v)).collect()
    }

    #[test]
    fn test_basic_aggregation() {
        let aggregator = WeeklyAggregator::default();
        let raw = numbers(&[1000.0, 1200.0, 1100.0, 0.0, 900.0, 0.0, 0.0]);

        let result = aggregator.aggregate(&press(), monday(), &raw, None).unwrap();
        let record = result.record;

        assert!(result.warnings.is_empty());
        assert_eq!(record.total, 4200.0);
        assert_eq!(record.average, 600.0);
        assert_eq!(record.total_source, TotalSource::Computed);

        let hours: Vec<f64> = record.days.iter().map(|d| d.hours).collect();
        assert_eq!(hours, vec![24.0, 24.0, 24.0, 0.0, 24.0, 0.0, 0.0]);

        assert_eq!(record.days[0].date, monday());
        assert_eq!(record.days[6].date, NaiveDate::from_ymd_opt(2025, 1, 12).unwrap());
        assert_eq!(record.days[3].status, DayStatus::Idle);
        // 1000 hits over 24h against 100/h
        assert!((record.days[0].efficiency.unwrap() - 1000.0 / 24.0 / 100.0).abs() < 1e-12);
    }

    #[test]
    fn test_explicit_total_override() {
        let aggregator = WeeklyAggregator::default();
        let raw = numbers(&[1000.0, 1200.0, 1100.0, 0.0, 900.0, 0.0, 0.0]);
        let sheet_total = CellValue::Number(4300.0);

        let result = aggregator
            .aggregate(&press(), monday(), &raw, Some(&sheet_total))
            .unwrap();

        assert_eq!(result.record.total, 4300.0);
        assert_eq!(result.record.total_source, TotalSource::Explicit);
        assert_eq!(result.record.explicit_total, Some(4300.0));
        assert!((result.record.average - 4300.0 / 7.0).abs() < 1e-9);
        assert_eq!(
            result.warnings,
            vec![Warning::TotalsMismatch {
                computed: 4200.0,
                explicit: 4300.0
            }]
        );
    }

    #[test]
    fn test_explicit_total_within_tolerance_keeps_sum() {
        let aggregator = WeeklyAggregator::default();
        let raw = numbers(&[100.4, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let sheet_total = CellValue::Number(100.0);

        let result = aggregator
            .aggregate(&press(), monday(), &raw, Some(&sheet_total))
            .unwrap();

        assert!(result.warnings.is_empty());
        assert_eq!(result.record.total, 100.4);
        assert_eq!(result.record.total_source, TotalSource::Computed);
    }

    #[test]
    fn test_unreadable_explicit_total_ignored() {
        let aggregator = WeeklyAggregator::default();
        let raw = numbers(&[10.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);

        let result = aggregator
            .aggregate(&press(), monday(), &raw, Some(&CellValue::Text("#REF!".into())))
            .unwrap();
        assert_eq!(result.record.total, 10.0);
        assert_eq!(result.record.explicit_total, None);
    }

    #[test]
    fn test_total_and_average_derivation() {
        let aggregator = WeeklyAggregator::default();
        let cases: [[f64; 7]; 4] = [
            [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0],
            [1.5, 2.25, 3.125, 0.0, 10.0, 7.0, 0.333],
            [99999.0, 88888.0, 0.0, 1.0, 2.0, 3.0, 4.0],
            [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7],
        ];

        for days in cases {
            let record = aggregator
                .aggregate(&press(), monday(), &numbers(&days), None)
                .unwrap()
                .record;
            let sum: f64 = days.iter().sum();
            assert!((record.total - sum).abs() < 1e-9);
            assert!((record.average - record.total / 7.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_missing_days_are_not_reported() {
        let aggregator = WeeklyAggregator::default();
        let mut raw = vec![CellValue::Missing; 7];
        raw[0] = CellValue::Number(700.0);
        raw[1] = CellValue::Number(0.0);

        let record = aggregator.aggregate(&press(), monday(), &raw, None).unwrap().record;

        assert_eq!(record.days[0].status, DayStatus::Produced);
        assert_eq!(record.days[1].status, DayStatus::Idle);
        assert_eq!(record.days[2].status, DayStatus::NotReported);
        assert_eq!(record.days[2].count, 0.0);
        assert_eq!(record.reported_days(), 2);
        assert_eq!(record.total, 700.0);
        assert_eq!(record.average, 100.0);
    }

    #[test]
    fn test_week_start_snaps_to_monday() {
        let aggregator = WeeklyAggregator::default();
        let thursday = NaiveDate::from_ymd_opt(2025, 1, 9).unwrap();

        let record = aggregator
            .aggregate(&press(), thursday, &numbers(&[1.0; 7]), None)
            .unwrap()
            .record;
        assert_eq!(record.week_start, monday());
    }

    #[test]
    fn test_incomplete_group() {
        let aggregator = WeeklyAggregator::default();
        let err = aggregator
            .aggregate(&press(), monday(), &numbers(&[1.0, 2.0, 3.0]), None)
            .unwrap_err();
        assert_eq!(err, AggregationError::IncompleteGroup { expected: 7, found: 3 });
    }

    #[test]
    fn test_negative_value() {
        let aggregator = WeeklyAggregator::default();
        let err = aggregator
            .aggregate(&press(), monday(), &numbers(&[1.0, 2.0, -3.0, 0.0, 0.0, 0.0, 0.0]), None)
            .unwrap_err();
        assert_eq!(
            err,
            AggregationError::NegativeValue {
                day: Weekday::Wed,
                value: -3.0
            }
        );
    }

    #[test]
    fn test_invalid_cell() {
        let aggregator = WeeklyAggregator::default();
        let mut raw = numbers(&[1.0; 7]);
        raw[4] = CellValue::Text("down".into());

        let err = aggregator.aggregate(&press(), monday(), &raw, None).unwrap_err();
        assert_eq!(
            err,
            AggregationError::InvalidCell {
                day: Weekday::Fri,
                source: CellError::NotNumeric("down".into())
            }
        );
    }

    #[test]
    fn test_fixed_schedule_hours() {
        let aggregator = WeeklyAggregator::new(
            OperatingSchedule::Fixed {
                hours: [16.0, 16.0, 16.0, 16.0, 16.0, 0.0, 0.0],
            },
            DEFAULT_TOTAL_TOLERANCE,
        );
        let raw = numbers(&[1600.0, 0.0, 1600.0, 1600.0, 1600.0, 0.0, 0.0]);

        let record = aggregator.aggregate(&press(), monday(), &raw, None).unwrap().record;

        // A reported zero on a scheduled day is a real 0% day
        assert_eq!(record.days[1].hours, 16.0);
        assert_eq!(record.days[1].efficiency, Some(0.0));
        assert_eq!(record.days[0].efficiency, Some(1.0));
        assert_eq!(record.operating_hours(), 80.0);
        assert_eq!(record.efficiency(100.0), Some(6400.0 / 80.0 / 100.0));
    }
}
