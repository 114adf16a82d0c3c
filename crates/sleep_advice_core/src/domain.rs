//! crates/sleep_advice_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::collections::BTreeMap;

use crate::ports::PortError;

/// Length of the trailing statistics window, in days.
pub const STATS_WINDOW_DAYS: i64 = 7;

/// One recorded night (or nap) of sleep for a user.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepSample {
    pub id: i64,
    pub user_id: i64,
    pub sleep_time: DateTime<Utc>,
    pub wake_time: DateTime<Utc>,
    pub duration_hours: f64,
}

impl SleepSample {
    /// Builds a sample, deriving its duration from the two timestamps.
    ///
    /// The wake time must be strictly after the sleep time, and the derived
    /// duration (rounded to one decimal) must stay positive.
    pub fn new(
        id: i64,
        user_id: i64,
        sleep_time: DateTime<Utc>,
        wake_time: DateTime<Utc>,
    ) -> Result<Self, PortError> {
        if wake_time <= sleep_time {
            return Err(PortError::Unexpected(format!(
                "Sample {} wakes at {} which is not after {}",
                id, wake_time, sleep_time
            )));
        }

        let seconds = (wake_time - sleep_time).num_seconds() as f64;
        let duration_hours = round_to(seconds / 3600.0, 1);
        if duration_hours <= 0.0 {
            return Err(PortError::Unexpected(format!(
                "Sample {} is shorter than a tenth of an hour",
                id
            )));
        }

        Ok(Self {
            id,
            user_id,
            sleep_time,
            wake_time,
            duration_hours,
        })
    }
}

/// Total sleep attributed to one calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySleep {
    pub date: NaiveDate,
    pub duration_hours: f64,
}

/// Aggregated statistics over the trailing window for one user.
///
/// Recomputed on every request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WeeklyStats {
    pub daily_average: f64,
    /// Newest day first.
    pub series: Vec<DailySleep>,
}

impl WeeklyStats {
    /// Computes the statistics of the window ending at `window_end`.
    ///
    /// A sample belongs to the day on which it ended (its wake time), and
    /// several samples on the same day are summed.
    pub fn from_samples(samples: &[SleepSample], window_end: DateTime<Utc>) -> Self {
        let window_start = Self::window_start(window_end);

        let mut per_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for sample in samples
            .iter()
            .filter(|s| s.wake_time >= window_start && s.wake_time <= window_end)
        {
            *per_day.entry(sample.wake_time.date_naive()).or_default() += sample.duration_hours;
        }

        let series: Vec<DailySleep> = per_day
            .into_iter()
            .rev()
            .map(|(date, hours)| DailySleep {
                date,
                duration_hours: round_to(hours, 1),
            })
            .collect();

        Self::from_series(series)
    }

    /// Midnight (UTC) of the oldest calendar day in the window ending at `window_end`.
    ///
    /// The window covers exactly `STATS_WINDOW_DAYS` dates, the last of which
    /// is the date of `window_end` itself.
    pub fn window_start(window_end: DateTime<Utc>) -> DateTime<Utc> {
        let first_day = window_end.date_naive() - Duration::days(STATS_WINDOW_DAYS - 1);
        first_day.and_time(NaiveTime::MIN).and_utc()
    }

    /// Builds the statistics from an already aggregated series.
    pub fn from_series(series: Vec<DailySleep>) -> Self {
        let daily_average = if series.is_empty() {
            0.0
        } else {
            let total: f64 = series.iter().map(|d| d.duration_hours).sum();
            round_to(total / series.len() as f64, 2)
        };

        Self {
            daily_average,
            series,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
