pub mod db;
pub mod logging;
pub mod monitor;
pub mod server;
pub mod status;
pub mod version;
pub mod web;
