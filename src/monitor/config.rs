use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Every environment variable the monitor reads starts with this.
pub const ENV_PREFIX: &str = "PRODUCTION_MONITOR_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file at {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
}

/// Settings of the monitoring client embedded in a host application.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub enabled: bool,
    pub api_url: String,
    pub api_key: Option<String>,
    /// Probability in `[0, 1]` that a request is sampled.
    pub sample_rate: f64,
    pub report_errors: bool,
    /// Minutes between liveness pings.
    pub ping_interval: u64,
    /// Seconds before an outbound call is abandoned.
    pub timeout: u64,
    /// Total attempts per outbound call.
    pub retry_attempts: u32,
    pub environment: String,
    /// Memory budget of the host process, e.g. `256M`. Physical memory when unset.
    pub memory_limit: Option<String>,
    /// Disk usage is reported for the filesystem holding this path.
    pub disk_path: PathBuf,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialMonitorConfig {
    enabled: Option<bool>,
    api_url: Option<String>,
    api_key: Option<String>,
    sample_rate: Option<f64>,
    report_errors: Option<bool>,
    ping_interval: Option<u64>,
    timeout: Option<u64>,
    retry_attempts: Option<u32>,
    environment: Option<String>,
    memory_limit: Option<String>,
    disk_path: Option<PathBuf>,
}

pub const DEFAULT_API_URL: &str = "https://your-monitoring-dashboard.com";
pub const DEFAULT_SAMPLE_RATE: f64 = 0.1;
pub const DEFAULT_PING_INTERVAL_MINUTES: u64 = 5;
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 5;
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const PRODUCTION_ENVIRONMENT: &str = "production";

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::merge(PartialMonitorConfig::default(), PartialMonitorConfig::default())
    }
}

impl MonitorConfig {
    /// Loads `.env`, then the optional TOML file, then `PRODUCTION_MONITOR_*`
    /// variables. The environment wins over the file.
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::load_with_env(config_path, std::env::vars())
    }

    pub fn load_with_env<I>(config_path: Option<&str>, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let file_config = match config_path {
            Some(path_str) => read_file_config(Path::new(path_str))?,
            None => PartialMonitorConfig::default(),
        };
        let env_config: PartialMonitorConfig = envy::prefixed(ENV_PREFIX).from_iter(vars)?;

        let config = Self::merge(env_config, file_config);
        info!(
            enabled = config.enabled,
            api_url = %config.api_url,
            sample_rate = config.sample_rate,
            environment = %config.environment,
            "Loaded monitor configuration."
        );
        Ok(config)
    }

    fn merge(env_config: PartialMonitorConfig, file_config: PartialMonitorConfig) -> Self {
        let sample_rate = env_config
            .sample_rate
            .or(file_config.sample_rate)
            .unwrap_or(DEFAULT_SAMPLE_RATE);

        MonitorConfig {
            enabled: env_config.enabled.or(file_config.enabled).unwrap_or(true),
            api_url: env_config
                .api_url
                .or(file_config.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            api_key: env_config
                .api_key
                .or(file_config.api_key)
                .filter(|key| !key.trim().is_empty()),
            sample_rate: normalize_sample_rate(sample_rate),
            report_errors: env_config
                .report_errors
                .or(file_config.report_errors)
                .unwrap_or(true),
            ping_interval: env_config
                .ping_interval
                .or(file_config.ping_interval)
                .unwrap_or(DEFAULT_PING_INTERVAL_MINUTES),
            timeout: env_config
                .timeout
                .or(file_config.timeout)
                .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            retry_attempts: env_config
                .retry_attempts
                .or(file_config.retry_attempts)
                .unwrap_or(DEFAULT_RETRY_ATTEMPTS),
            environment: env_config
                .environment
                .or(file_config.environment)
                .unwrap_or_else(|| PRODUCTION_ENVIRONMENT.to_string()),
            memory_limit: env_config.memory_limit.or(file_config.memory_limit),
            disk_path: env_config
                .disk_path
                .or(file_config.disk_path)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case(PRODUCTION_ENVIRONMENT)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval.max(1).saturating_mul(60))
    }
}

fn read_file_config(path: &Path) -> Result<PartialMonitorConfig, ConfigError> {
    if !path.exists() {
        warn!(path = ?path, "Config file not found, using environment and defaults.");
        return Ok(PartialMonitorConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn normalize_sample_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        warn!("Sample rate is not a number, falling back to the default.");
        return DEFAULT_SAMPLE_RATE;
    }
    rate.clamp(0.0, 1.0)
}
