//! In-process side of monitoring: request sampling, error reporting and the
//! client that ships both to the ingestion server.

use std::sync::Arc;
use tracing::{info, warn};

pub mod client;
pub mod collector;
pub mod config;
pub mod error_reporter;
pub mod middleware;
pub mod models;

#[cfg(test)]
mod test_support;

use crate::monitor::client::MonitoringClient;
use crate::monitor::collector::Collector;
use crate::monitor::config::MonitorConfig;
use crate::monitor::error_reporter::{ExceptionHandler, MonitoringErrorHandler};

/// Monitoring wired up from one configuration: a single shared client handle
/// injected into the collector and, on demand, into error handlers.
pub struct Monitor {
    config: Arc<MonitorConfig>,
    client: Arc<MonitoringClient>,
    collector: Arc<Collector>,
}

impl Monitor {
    /// Returns `None` when monitoring is switched off or cannot be set up;
    /// the host then runs without it.
    pub fn from_config(config: MonitorConfig) -> Option<Self> {
        if !config.enabled {
            info!("Production monitoring is disabled.");
            return None;
        }
        let client = match MonitoringClient::from_config(&config) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                warn!(error = %e, "Production monitoring is not configured, continuing without it.");
                return None;
            }
        };
        let collector = Arc::new(Collector::new(&config, Arc::clone(&client)));
        info!(
            api_url = %client.base_url(),
            sample_rate = collector.sampler().rate(),
            environment = %config.environment,
            "Production monitoring enabled."
        );
        Some(Self {
            config: Arc::new(config),
            client,
            collector,
        })
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn client(&self) -> Arc<MonitoringClient> {
        Arc::clone(&self.client)
    }

    /// State for [`middleware::monitor_requests`].
    pub fn collector(&self) -> Arc<Collector> {
        Arc::clone(&self.collector)
    }

    pub fn error_handler<H: ExceptionHandler>(&self, inner: H) -> MonitoringErrorHandler<H> {
        MonitoringErrorHandler::new(inner, self.client(), &self.config)
    }
}
