//! Canonical weekly production records

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::ingest::error::Warning;

/// Days in a production week
pub const DAYS_PER_WEEK: usize = 7;

/// What a day's cell told us
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    /// Cell was empty: no figure entered
    NotReported,
    /// A zero was entered
    Idle,
    /// Positive production
    Produced,
}

impl DayStatus {
    pub fn is_reported(&self) -> bool {
        !matches!(self, DayStatus::NotReported)
    }
}

/// One day of production for one machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    /// Hit count; 0 when not reported
    pub count: f64,
    pub status: DayStatus,
    /// Operating hours for the day
    pub hours: f64,
    /// (count / hours) / target rate; `None` without hours or a report
    pub efficiency: Option<f64>,
}

impl DailyBucket {
    pub fn new(date: NaiveDate, reported: Option<f64>, hours: f64, target_rate: f64) -> Self {
        let status = match reported {
            None => DayStatus::NotReported,
            Some(c) if c == 0.0 => DayStatus::Idle,
            Some(_) => DayStatus::Produced,
        };
        let count = reported.unwrap_or(0.0);
        let efficiency = if status.is_reported() && hours > 0.0 {
            Some((count / hours) / target_rate)
        } else {
            None
        };

        DailyBucket {
            date,
            count,
            status,
            hours,
            efficiency,
        }
    }

    /// Reported count, `None` when the day was left blank
    pub fn reported(&self) -> Option<f64> {
        self.status.is_reported().then_some(self.count)
    }
}

/// Which figure `WeeklyRecord::total` holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalSource {
    /// Sum of the daily counts
    Computed,
    /// Total taken from the sheet because it disagreed with the sum
    Explicit,
}

impl TotalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TotalSource::Computed => "computed",
            TotalSource::Explicit => "explicit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "computed" => Some(TotalSource::Computed),
            "explicit" => Some(TotalSource::Explicit),
            _ => None,
        }
    }
}

/// (machine id, week start) pair identifying one stored weekly record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    pub machine_id: String,
    pub week_start: NaiveDate,
}

impl NaturalKey {
    pub fn new(machine_id: impl Into<String>, week_start: NaiveDate) -> Self {
        NaturalKey {
            machine_id: machine_id.into(),
            week_start,
        }
    }
}

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.machine_id, self.week_start)
    }
}

/// One machine's production for one Monday-to-Sunday week
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyRecord {
    pub machine_id: String,
    /// Monday of the week
    pub week_start: NaiveDate,
    /// Monday through Sunday
    pub days: [DailyBucket; DAYS_PER_WEEK],
    pub total: f64,
    /// total / 7, regardless of how many days ran
    pub average: f64,
    /// Total printed on the sheet, if the layout has one
    pub explicit_total: Option<f64>,
    pub total_source: TotalSource,
}

impl WeeklyRecord {
    /// Build a record from daily buckets and settle its totals
    pub fn new(
        machine_id: impl Into<String>,
        week_start: NaiveDate,
        days: [DailyBucket; DAYS_PER_WEEK],
        explicit_total: Option<f64>,
        tolerance: f64,
    ) -> (Self, Option<Warning>) {
        let mut record = WeeklyRecord {
            machine_id: machine_id.into(),
            week_start,
            days,
            total: 0.0,
            average: 0.0,
            explicit_total,
            total_source: TotalSource::Computed,
        };
        let warning = record.settle_totals(tolerance);
        (record, warning)
    }

    pub fn key(&self) -> NaturalKey {
        NaturalKey::new(&self.machine_id, self.week_start)
    }

    pub fn computed_total(&self) -> f64 {
        self.days.iter().map(|d| d.count).sum()
    }

    pub fn operating_hours(&self) -> f64 {
        self.days.iter().map(|d| d.hours).sum()
    }

    /// Weekly efficiency against a target rate, `None` when no hours ran
    pub fn efficiency(&self, target_rate: f64) -> Option<f64> {
        let hours = self.operating_hours();
        (hours > 0.0).then(|| (self.total / hours) / target_rate)
    }

    pub fn reported_days(&self) -> usize {
        self.days.iter().filter(|d| d.status.is_reported()).count()
    }

    /// Recompute total and average from the buckets and explicit total
    ///
    /// The sheet's own total wins when it differs from the sum by more than
    /// `tolerance`; the mismatch is returned as a warning.
    pub fn settle_totals(&mut self, tolerance: f64) -> Option<Warning> {
        let computed = self.computed_total();
        let mut warning = None;

        match self.explicit_total {
            Some(explicit) if (explicit - computed).abs() > tolerance => {
                self.total = explicit;
                self.total_source = TotalSource::Explicit;
                warning = Some(Warning::TotalsMismatch { computed, explicit });
            }
            _ => {
                self.total = computed;
                self.total_source = TotalSource::Computed;
            }
        }

        self.average = self.total / DAYS_PER_WEEK as f64;
        warning
    }
}

/// Monday of the ISO week containing `date`
pub fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Weekday for a bucket index (0 = Monday)
pub fn weekday_at(index: usize) -> Weekday {
    match index % DAYS_PER_WEEK {
        0 => Weekday::Mon,
        1 => Weekday::Tue,
        2 => Weekday::Wed,
        3 => Weekday::Thu,
        4 => Weekday::Fri,
        5 => Weekday::Sat,
        _ => Weekday::Sun,
    }
}
