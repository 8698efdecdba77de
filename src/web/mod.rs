use axum::{
    Router,
    http::{HeaderName, Method, header},
    middleware as axum_middleware,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::server::config::ServerConfig;
use crate::web::{middleware::auth, routes::*};

pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
}

/// Permissive CORS for browser-side reporters, allowing `method` and
/// `OPTIONS`. Preflight requests are answered here, before authentication.
fn cors_layer(method: Method) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![method, Method::OPTIONS])
        .allow_headers(vec![
            header::AUTHORIZATION,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            header::CONTENT_TYPE,
        ])
}

pub fn create_axum_router(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Router {
    let app_state = Arc::new(AppState { db_pool, config });
    let auth_layer =
        axum_middleware::from_fn_with_state(app_state.clone(), auth::require_project_key);

    Router::new()
        .merge(
            ingest_routes::create_ingest_router()
                .route_layer(auth_layer.clone())
                .layer(cors_layer(Method::POST)),
        )
        .merge(
            status_routes::create_status_router()
                .route_layer(auth_layer)
                .layer(cors_layer(Method::GET)),
        )
        .with_state(app_state)
}
