use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::{error, warn};

use crate::db::services::project_service;
use crate::web::{AppState, error::AppError};

/// Resolves `Authorization: Bearer <api key>` to an active project and puts
/// its model into the request extensions.
pub async fn require_project_key(
    State(state): State<Arc<AppState>>,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .map(|token| token.to_string())
        .ok_or(AppError::MissingAuthorization)?;

    let project = project_service::find_active_by_api_key(&state.db_pool, &api_key)
        .await
        .map_err(|e| {
            error!(error = %e, "Project lookup failed during API key auth.");
            AppError::InvalidApiKey
        })?
        .ok_or_else(|| {
            warn!(path = %req.uri().path(), "Rejected request with unknown or inactive API key.");
            AppError::InvalidApiKey
        })?;

    req.extensions_mut().insert(project);
    Ok(next.run(req).await)
}
