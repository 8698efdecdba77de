use axum::{Extension, Json, Router, extract::State, routing::get};
use chrono::Utc;
use std::sync::Arc;

use crate::db::entities::project;
use crate::status::{SystemStatus, compute_system_status};
use crate::web::{AppState, error::AppError};

async fn get_status_handler(
    Extension(project): Extension<project::Model>,
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<SystemStatus>, AppError> {
    let status = compute_system_status(&app_state.db_pool, project.id, Utc::now()).await?;
    Ok(Json(status))
}

pub fn create_status_router() -> Router<Arc<AppState>> {
    Router::new().route("/status", get(get_status_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::enums::ErrorLevel;
    use crate::db::services::{NewErrorLog, NewSystemMetric, error_log_service, metrics_service, project_service};
    use crate::db::setup_test_db;
    use crate::server::config::ServerConfig;
    use crate::web::create_axum_router;
    use axum::body::Body as AxumBody;
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_status_reflects_todays_errors_and_latency() {
        let db = setup_test_db().await;
        let project = project_service::create_project(&db, "owner-1", "Shop", "https://shop.example.com")
            .await
            .unwrap();
        let now = Utc::now();
        for i in 0..12 {
            error_log_service::insert_error_log(
                &db,
                project.id,
                NewErrorLog {
                    timestamp: now,
                    level: ErrorLevel::Error,
                    message: format!("failure {i}"),
                    file: "src/lib.rs".to_string(),
                    line: i,
                    trace: String::new(),
                    user_id: None,
                    ip_address: String::new(),
                    user_agent: String::new(),
                    request_url: String::new(),
                    request_method: String::new(),
                },
            )
            .await
            .unwrap();
        }
        for response_time in [100.0, 300.0] {
            metrics_service::insert_metric(
                &db,
                project.id,
                NewSystemMetric {
                    timestamp: now,
                    memory_usage: 0.0,
                    cpu_usage: 0.0,
                    disk_usage: 0.0,
                    active_users: 0,
                    response_time,
                },
            )
            .await
            .unwrap();
        }

        let app = create_axum_router(
            db,
            Arc::new(ServerConfig {
                database_url: "sqlite::memory:".to_string(),
                listen_address: "127.0.0.1:0".to_string(),
                log_dir: "logs".to_string(),
            }),
        );
        let req = Request::builder()
            .uri("/status")
            .header(header::AUTHORIZATION, format!("Bearer {}", project.api_key))
            .body(AxumBody::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let status: SystemStatus = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(status.total_errors_today, 12);
        assert_eq!(status.status.to_string(), "warning");
        assert_eq!(status.avg_response_time, 200.0);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_status_requires_a_key() {
        let db = setup_test_db().await;
        let app = create_axum_router(
            db,
            Arc::new(ServerConfig {
                database_url: "sqlite::memory:".to_string(),
                listen_address: "127.0.0.1:0".to_string(),
                log_dir: "logs".to_string(),
            }),
        );
        let req = Request::builder().uri("/status").body(AxumBody::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_status_preflight_allows_get() {
        let db = setup_test_db().await;
        let app = create_axum_router(
            db,
            Arc::new(ServerConfig {
                database_url: "sqlite::memory:".to_string(),
                listen_address: "127.0.0.1:0".to_string(),
                log_dir: "logs".to_string(),
            }),
        );
        let req = Request::builder()
            .method(axum::http::Method::OPTIONS)
            .uri("/status")
            .header(header::ORIGIN, "https://dashboard.example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
            .body(AxumBody::empty())
            .unwrap();

        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
        let methods = headers
            .get(header::ACCESS_CONTROL_ALLOW_METHODS)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();
        assert!(methods.contains("get"), "GET missing from {methods}");
    }
}
