//! Operating-hours model used for efficiency

use chrono::Weekday;
use serde::{Deserialize, Serialize};

fn default_weekday_hours() -> f64 {
    24.0
}

fn default_weekend_hours() -> f64 {
    16.0
}

/// Where a day's operating hours come from
///
/// `Inferred` guesses the schedule from output: a day with production ran a
/// full weekday (24h) or weekend (16h) schedule, a day without ran 0h. It
/// cannot tell "not entered" from "did not run", so prefer `Fixed` whenever
/// the real shift pattern is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum OperatingSchedule {
    Inferred {
        #[serde(default = "default_weekday_hours")]
        weekday_hours: f64,
        #[serde(default = "default_weekend_hours")]
        weekend_hours: f64,
    },
    /// Scheduled hours Monday through Sunday, independent of output
    Fixed { hours: [f64; 7] },
}

impl OperatingSchedule {
    /// Operating hours for a day given its reported count
    pub fn hours_for(&self, day: Weekday, count: Option<f64>) -> f64 {
        match self {
            OperatingSchedule::Inferred {
                weekday_hours,
                weekend_hours,
            } => match count {
                Some(c) if c > 0.0 => {
                    if matches!(day, Weekday::Sat | Weekday::Sun) {
                        *weekend_hours
                    } else {
                        *weekday_hours
                    }
                }
                _ => 0.0,
            },
            OperatingSchedule::Fixed { hours } => hours[day.num_days_from_monday() as usize],
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        let all: Vec<f64> = match self {
            OperatingSchedule::Inferred {
                weekday_hours,
                weekend_hours,
            } => vec![*weekday_hours, *weekend_hours],
            OperatingSchedule::Fixed { hours } => hours.to_vec(),
        };
        if all.iter().any(|h| !h.is_finite() || *h < 0.0 || *h > 24.0) {
            return Err(format!("schedule hours must be between 0 and 24, got {:?}", all));
        }
        Ok(())
    }
}

impl Default for OperatingSchedule {
    fn default() -> Self {
        OperatingSchedule::Inferred {
            weekday_hours: default_weekday_hours(),
            weekend_hours: default_weekend_hours(),
        }
    }
}
