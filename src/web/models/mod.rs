use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::enums::ErrorLevel;
use crate::db::services::{NewErrorLog, NewSystemMetric};

/// Body of `POST /metrics`. Every field is optional; missing numbers are 0
/// and a missing timestamp means "now".
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MetricsPayload {
    pub timestamp: Option<DateTime<Utc>>,
    pub memory_usage: f64,
    pub cpu_usage: f64,
    pub disk_usage: f64,
    pub active_users: i64,
    pub response_time: f64,
}

impl MetricsPayload {
    pub fn into_new_metric(self, now: DateTime<Utc>) -> NewSystemMetric {
        NewSystemMetric {
            timestamp: self.timestamp.unwrap_or(now),
            memory_usage: self.memory_usage,
            cpu_usage: self.cpu_usage,
            disk_usage: self.disk_usage,
            active_users: self.active_users,
            response_time: self.response_time,
        }
    }
}

/// Body of `POST /errors`. Missing strings are empty, a missing level is
/// `error`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ErrorPayload {
    pub timestamp: Option<DateTime<Utc>>,
    pub level: ErrorLevel,
    pub message: String,
    pub file: String,
    pub line: i32,
    pub trace: String,
    pub user_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub request_url: String,
    pub request_method: String,
}

impl ErrorPayload {
    pub fn into_new_error_log(self, now: DateTime<Utc>) -> NewErrorLog {
        NewErrorLog {
            timestamp: self.timestamp.unwrap_or(now),
            level: self.level,
            message: self.message,
            file: self.file,
            line: self.line,
            trace: self.trace,
            user_id: self.user_id,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            request_url: self.request_url,
            request_method: self.request_method,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
