use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::enums::ErrorLevel;

/// One sampled request, as posted to `/metrics`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemMetricsSample {
    pub timestamp: DateTime<Utc>,
    pub memory_usage: f64,
    pub cpu_usage: f64,
    pub disk_usage: f64,
    pub active_users: u64,
    pub response_time: f64,
}

/// One reported error, as posted to `/errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub timestamp: DateTime<Utc>,
    pub level: ErrorLevel,
    pub message: String,
    pub file: String,
    pub line: u32,
    pub trace: String,
    pub user_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub request_url: String,
    pub request_method: String,
}

/// Marker a host inserts into request extensions once it knows who is
/// calling. The collector and the error reporter read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: String,
}
