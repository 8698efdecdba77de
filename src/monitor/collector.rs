use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{Disks, ProcessRefreshKind, ProcessesToUpdate, System};
use tracing::{debug, warn};

use crate::monitor::client::MonitoringClient;
use crate::monitor::config::MonitorConfig;
use crate::monitor::models::SystemMetricsSample;

/// Users seen within this window count as active.
pub const ACTIVE_USER_WINDOW: Duration = Duration::from_secs(5 * 60);

/// Decides per request whether it gets measured.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampler {
    rate: f64,
}

impl Sampler {
    pub fn new(rate: f64) -> Self {
        let rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };
        Self { rate }
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn should_collect(&self) -> bool {
        self.should_collect_with(&mut rand::rng())
    }

    /// A uniform draw in `[0, 1)` below the rate means collect.
    pub fn should_collect_with<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.random::<f64>() < self.rate
    }
}

/// Host-side view of its session storage.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Distinct users with activity at or after `since`. `Ok(None)` means the
    /// host keeps no session table to ask.
    async fn distinct_users_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Option<u64>, Box<dyn Error + Send + Sync>>;
}

/// Best-effort active user count: the session store if it can answer, else
/// whether the current request is authenticated, else 0 on failure.
pub async fn count_active_users(
    sessions: Option<&dyn SessionStore>,
    authenticated: bool,
    now: DateTime<Utc>,
) -> u64 {
    let fallback = u64::from(authenticated);
    let Some(store) = sessions else {
        return fallback;
    };
    let window = chrono::Duration::from_std(ACTIVE_USER_WINDOW).unwrap_or(chrono::Duration::zero());
    match store.distinct_users_since(now - window).await {
        Ok(Some(count)) => count,
        Ok(None) => fallback,
        Err(e) => {
            debug!(error = %e, "Session store query failed, reporting 0 active users.");
            0
        }
    }
}

/// Parses a memory limit such as `128M`, `1G`, `512k` or a plain byte count.
/// Negative values mean "no limit" and yield `None`, as does anything unparseable.
pub fn parse_memory_limit(value: &str) -> Option<u64> {
    let value = value.trim();
    if value.is_empty() || value.starts_with('-') {
        return None;
    }
    if let Ok(bytes) = value.parse::<u64>() {
        return Some(bytes);
    }

    let unit = value.chars().last()?;
    let number = &value[..value.len() - unit.len_utf8()];
    let multiplier: u64 = match unit.to_ascii_lowercase() {
        'k' => 1024,
        'm' => 1024 * 1024,
        'g' => 1024 * 1024 * 1024,
        _ => return None,
    };
    number.trim().parse::<u64>().ok()?.checked_mul(multiplier)
}

fn percentage(part: f64, whole: f64) -> f64 {
    if whole <= 0.0 || !part.is_finite() || !whole.is_finite() {
        return 0.0;
    }
    (part / whole * 100.0).clamp(0.0, 100.0)
}

/// Reads host-level gauges. Every reading degrades to 0 instead of failing.
#[derive(Debug, Clone)]
pub struct HostGauges {
    memory_limit: Option<u64>,
    disk_path: PathBuf,
}

/// Gauge values of one reading.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GaugeReading {
    pub memory_usage: f64,
    pub cpu_usage: f64,
    pub disk_usage: f64,
}

impl HostGauges {
    pub fn new(memory_limit: Option<u64>, disk_path: PathBuf) -> Self {
        Self {
            memory_limit,
            disk_path,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        let memory_limit = config.memory_limit.as_deref().and_then(|raw| {
            let parsed = parse_memory_limit(raw);
            if parsed.is_none() && !raw.trim().starts_with('-') {
                warn!(memory_limit = %raw, "Unrecognised memory limit, using physical memory instead.");
            }
            parsed
        });
        Self::new(memory_limit, config.disk_path.clone())
    }

    pub fn read(&self) -> GaugeReading {
        GaugeReading {
            memory_usage: self.memory_usage_percent(),
            cpu_usage: cpu_load_percent(),
            disk_usage: disk_usage_percent(&self.disk_path),
        }
    }

    /// Resident memory of this process relative to the configured limit, or
    /// to physical memory when no limit is set.
    pub fn memory_usage_percent(&self) -> f64 {
        let Ok(pid) = sysinfo::get_current_pid() else {
            return 0.0;
        };
        let mut sys = System::new();
        sys.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        let Some(used) = sys.process(pid).map(|p| p.memory()) else {
            return 0.0;
        };

        let limit = match self.memory_limit {
            Some(limit) => limit,
            None => {
                sys.refresh_memory();
                sys.total_memory()
            }
        };
        percentage(used as f64, limit as f64)
    }
}

/// One-minute load average scaled by 100 and capped at 100. Platforms without
/// load averages report 0.
pub fn cpu_load_percent() -> f64 {
    let load = System::load_average().one;
    if !load.is_finite() || load <= 0.0 {
        return 0.0;
    }
    (load * 100.0).min(100.0)
}

/// Used share of the filesystem holding `path`, picked by the longest
/// matching mount point.
pub fn disk_usage_percent(path: &Path) -> f64 {
    let target = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();

    let Some(disk) = disks
        .list()
        .iter()
        .filter(|disk| target.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().components().count())
    else {
        return 0.0;
    };

    let total = disk.total_space();
    let used = total.saturating_sub(disk.available_space());
    percentage(used as f64, total as f64)
}

/// Samples requests and ships the measurements to the monitoring service.
pub struct Collector {
    sampler: Sampler,
    gauges: HostGauges,
    sessions: Option<Arc<dyn SessionStore>>,
    client: Arc<MonitoringClient>,
}

impl Collector {
    pub fn new(config: &MonitorConfig, client: Arc<MonitoringClient>) -> Self {
        Self {
            sampler: Sampler::new(config.sample_rate),
            gauges: HostGauges::from_config(config),
            sessions: None,
            client,
        }
    }

    pub fn with_session_store(mut self, sessions: Arc<dyn SessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_sampler(mut self, sampler: Sampler) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn sampler(&self) -> &Sampler {
        &self.sampler
    }

    /// Builds the sample for a request that took `response_time`.
    pub async fn snapshot(&self, response_time: Duration, authenticated: bool) -> SystemMetricsSample {
        let now = Utc::now();
        let gauges = self.gauges.clone();
        let reading = tokio::task::spawn_blocking(move || gauges.read())
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "Gauge reading task failed, reporting zeros.");
                GaugeReading::default()
            });
        let active_users = count_active_users(self.sessions.as_deref(), authenticated, now).await;

        SystemMetricsSample {
            timestamp: now,
            memory_usage: reading.memory_usage,
            cpu_usage: reading.cpu_usage,
            disk_usage: reading.disk_usage,
            active_users,
            response_time: response_time.as_secs_f64() * 1000.0,
        }
    }

    /// Rolls the sampling dice for a finished request and, on a hit, measures
    /// and sends in the background. Returns whether the request was sampled.
    pub fn record(self: &Arc<Self>, response_time: Duration, authenticated: bool) -> bool {
        if !self.sampler.should_collect() {
            return false;
        }
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime available, dropping metrics sample.");
            return false;
        };

        let collector = Arc::clone(self);
        handle.spawn(async move {
            let sample = collector.snapshot(response_time, authenticated).await;
            collector.client.send_metrics(&sample).await;
        });
        true
    }
}
