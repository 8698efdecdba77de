pub mod ingest_routes;
pub mod status_routes;
