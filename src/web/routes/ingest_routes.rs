use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::State,
    routing::post,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::db::entities::project;
use crate::db::services::{error_log_service, metrics_service, project_service};
use crate::web::models::{ErrorPayload, MetricsPayload, SuccessResponse};
use crate::web::{AppState, error::AppError};

async fn refresh_last_ping(app_state: &AppState, project_id: i32) {
    if let Err(e) = project_service::touch_last_ping(&app_state.db_pool, project_id, Utc::now()).await {
        warn!(project_id, error = %e, "Failed to update last ping.");
    }
}

async fn ingest_metrics_handler(
    Extension(project): Extension<project::Model>,
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, AppError> {
    let payload: MetricsPayload = serde_json::from_slice(&body)?;

    metrics_service::insert_metric(&app_state.db_pool, project.id, payload.into_new_metric(Utc::now()))
        .await
        .map_err(|e| AppError::StoreMetrics(e.to_string()))?;
    debug!(project_id = project.id, "Stored metrics sample.");

    refresh_last_ping(&app_state, project.id).await;
    Ok(Json(SuccessResponse::ok()))
}

async fn ingest_error_handler(
    Extension(project): Extension<project::Model>,
    State(app_state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, AppError> {
    let payload: ErrorPayload = serde_json::from_slice(&body)?;

    error_log_service::insert_error_log(&app_state.db_pool, project.id, payload.into_new_error_log(Utc::now()))
        .await
        .map_err(|e| AppError::StoreErrorLog(e.to_string()))?;
    debug!(project_id = project.id, "Stored error log.");

    Ok(Json(SuccessResponse::ok()))
}

async fn ping_handler(
    Extension(project): Extension<project::Model>,
    State(app_state): State<Arc<AppState>>,
) -> Json<SuccessResponse> {
    refresh_last_ping(&app_state, project.id).await;
    Json(SuccessResponse::ok())
}

pub fn create_ingest_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/metrics", post(ingest_metrics_handler))
        .route("/errors", post(ingest_error_handler))
        .route("/ping", post(ping_handler))
}
