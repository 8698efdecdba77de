//! SeaORM entities for the monitoring store, one module per table.

pub mod error_log;
pub mod project;
pub mod system_metric;
