//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `SleepStatsService` port from the `core` crate. It reads sleep samples
//! from PostgreSQL using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sleep_advice_core::domain::{SleepSample, WeeklyStats};
use sleep_advice_core::ports::{PortError, PortResult, SleepStatsService};
use sqlx::{FromRow, PgPool};
use tracing::warn;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `SleepStatsService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn samples_between(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> PortResult<Vec<SleepSample>> {
        let records = sqlx::query_as::<_, SleepRecord>(
            "SELECT id, user_id, sleep_time, wake_time FROM sleep_records \
             WHERE user_id = $1 AND wake_time >= $2 AND wake_time <= $3 \
             ORDER BY wake_time DESC",
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let samples = records
            .into_iter()
            .filter_map(|record| {
                let id = record.id;
                match record.to_domain() {
                    Ok(sample) => Some(sample),
                    Err(e) => {
                        warn!("Skipping sleep record {}: {}", id, e);
                        None
                    }
                }
            })
            .collect();
        Ok(samples)
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct SleepRecord {
    id: i64,
    user_id: i64,
    sleep_time: DateTime<Utc>,
    wake_time: DateTime<Utc>,
}
impl SleepRecord {
    fn to_domain(self) -> PortResult<SleepSample> {
        SleepSample::new(self.id, self.user_id, self.sleep_time, self.wake_time)
    }
}

//=========================================================================================
// `SleepStatsService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SleepStatsService for DbAdapter {
    async fn get_weekly_stats(&self, user_id: i64) -> PortResult<WeeklyStats> {
        let window_end = Utc::now();
        let window_start = WeeklyStats::window_start(window_end);
        let samples = self.samples_between(user_id, window_start, window_end).await?;
        Ok(WeeklyStats::from_samples(&samples, window_end))
    }
}
