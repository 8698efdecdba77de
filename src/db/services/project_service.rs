use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set, TransactionTrait, prelude::Expr,
};
use uuid::Uuid;

use crate::db::entities::{error_log, project, system_metric};
use crate::db::enums::ProjectStatus;

/// Prefix shared by every generated API key.
pub const API_KEY_PREFIX: &str = "pm_";

pub fn generate_api_key() -> String {
    format!("{API_KEY_PREFIX}{}", Uuid::new_v4().simple())
}

// --- Project Registry Functions ---

/// Registers a new, active project for `owner_id` with a fresh API key.
pub async fn create_project(
    db: &DatabaseConnection,
    owner_id: &str,
    name: &str,
    url: &str,
) -> Result<project::Model, DbErr> {
    let now = Utc::now();
    let new_project = project::ActiveModel {
        owner_id: Set(owner_id.to_owned()),
        name: Set(name.to_owned()),
        url: Set(url.to_owned()),
        api_key: Set(generate_api_key()),
        status: Set(ProjectStatus::Active),
        created_at: Set(now),
        updated_at: Set(now),
        last_ping: Set(None),
        ..Default::default()
    };
    new_project.insert(db).await
}

pub async fn get_project(
    db: &DatabaseConnection,
    project_id: i32,
) -> Result<Option<project::Model>, DbErr> {
    project::Entity::find_by_id(project_id).one(db).await
}

/// Newest first, the way the dashboard lists them.
pub async fn list_projects_for_owner(
    db: &DatabaseConnection,
    owner_id: &str,
) -> Result<Vec<project::Model>, DbErr> {
    project::Entity::find()
        .filter(project::Column::OwnerId.eq(owner_id))
        .order_by_desc(project::Column::CreatedAt)
        .order_by_desc(project::Column::Id)
        .all(db)
        .await
}

/// Resolves an ingestion token. Inactive projects never match.
pub async fn find_active_by_api_key(
    db: &DatabaseConnection,
    api_key: &str,
) -> Result<Option<project::Model>, DbErr> {
    project::Entity::find()
        .filter(project::Column::ApiKey.eq(api_key))
        .filter(project::Column::Status.eq(ProjectStatus::Active))
        .one(db)
        .await
}

/// Updates the editable fields. Returns `None` when the project does not exist.
pub async fn update_project(
    db: &DatabaseConnection,
    project_id: i32,
    name: Option<String>,
    url: Option<String>,
) -> Result<Option<project::Model>, DbErr> {
    let Some(existing) = get_project(db, project_id).await? else {
        return Ok(None);
    };
    let mut active = existing.into_active_model();
    if let Some(name) = name {
        active.name = Set(name);
    }
    if let Some(url) = url {
        active.url = Set(url);
    }
    active.updated_at = Set(Utc::now());
    active.update(db).await.map(Some)
}

pub async fn set_project_status(
    db: &DatabaseConnection,
    project_id: i32,
    status: ProjectStatus,
) -> Result<bool, DbErr> {
    let result = project::Entity::update_many()
        .col_expr(project::Column::Status, Expr::value(status))
        .col_expr(project::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(project::Column::Id.eq(project_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected > 0)
}

/// Replaces the project's API key; the old key stops working immediately.
pub async fn regenerate_api_key(
    db: &DatabaseConnection,
    project_id: i32,
) -> Result<Option<String>, DbErr> {
    let new_key = generate_api_key();
    let result = project::Entity::update_many()
        .col_expr(project::Column::ApiKey, Expr::value(new_key.clone()))
        .col_expr(project::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(project::Column::Id.eq(project_id))
        .exec(db)
        .await?;
    Ok((result.rows_affected > 0).then_some(new_key))
}

/// Records that the project was heard from at `at`.
pub async fn touch_last_ping(
    db: &DatabaseConnection,
    project_id: i32,
    at: DateTime<Utc>,
) -> Result<(), DbErr> {
    project::Entity::update_many()
        .col_expr(project::Column::LastPing, Expr::value(Some(at)))
        .filter(project::Column::Id.eq(project_id))
        .exec(db)
        .await?;
    Ok(())
}

/// Deletes a project together with its samples and error records.
pub async fn delete_project(db: &DatabaseConnection, project_id: i32) -> Result<bool, DbErr> {
    let txn = db.begin().await?;
    system_metric::Entity::delete_many()
        .filter(system_metric::Column::ProjectId.eq(project_id))
        .exec(&txn)
        .await?;
    error_log::Entity::delete_many()
        .filter(error_log::Column::ProjectId.eq(project_id))
        .exec(&txn)
        .await?;
    let result = project::Entity::delete_by_id(project_id).exec(&txn).await?;
    txn.commit().await?;
    Ok(result.rows_affected > 0)
}
