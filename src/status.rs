//! Health snapshot of a project, derived from what it has reported.
//!
//! Nothing here is cached: every call reads the store and classifies again.

use chrono::{DateTime, NaiveTime, Utc};
use sea_orm::{DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::services::{error_log_service, metrics_service};

/// More errors than this today is critical.
pub const CRITICAL_ERROR_THRESHOLD: u64 = 50;
/// More errors than this today is a warning.
pub const WARNING_ERROR_THRESHOLD: u64 = 10;
/// How many of the latest samples feed the average response time.
pub const RESPONSE_TIME_WINDOW: u64 = 10;
/// Reported until real uptime tracking exists.
pub const PLACEHOLDER_UPTIME_SECONDS: u64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Warning => write!(f, "warning"),
            HealthStatus::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub status: HealthStatus,
    pub uptime: u64,
    pub last_error: Option<String>,
    pub total_errors_today: u64,
    pub avg_response_time: f64,
}

/// Maps today's error count onto a status. Both thresholds are exclusive.
pub fn classify_error_count(error_count: u64) -> HealthStatus {
    if error_count > CRITICAL_ERROR_THRESHOLD {
        HealthStatus::Critical
    } else if error_count > WARNING_ERROR_THRESHOLD {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

pub fn average_response_time(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// UTC midnight of the day `now` falls on.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

pub async fn compute_system_status(
    db: &DatabaseConnection,
    project_id: i32,
    now: DateTime<Utc>,
) -> Result<SystemStatus, DbErr> {
    let today = start_of_day(now);

    let total_errors_today = error_log_service::count_errors_since(db, project_id, today).await?;
    let last_error = error_log_service::latest_error_since(db, project_id, today)
        .await?
        .map(|record| record.message);
    let response_times =
        metrics_service::latest_response_times(db, project_id, RESPONSE_TIME_WINDOW).await?;

    Ok(SystemStatus {
        status: classify_error_count(total_errors_today),
        uptime: PLACEHOLDER_UPTIME_SECONDS,
        last_error,
        total_errors_today,
        avg_response_time: average_response_time(&response_times),
    })
}
