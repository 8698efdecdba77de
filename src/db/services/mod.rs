//! Data access for the monitoring store.
//!
//! Each sub-module owns one table; handlers and the status aggregator call
//! these functions instead of building queries themselves.

pub mod error_log_service;
pub mod metrics_service;
pub mod project_service;

pub use error_log_service::*;
pub use metrics_service::*;
pub use project_service::*;
