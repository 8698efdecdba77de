use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::db::entities::system_metric;

/// One sample as received from a monitored application.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSystemMetric {
    pub timestamp: DateTime<Utc>,
    pub memory_usage: f64,
    pub cpu_usage: f64,
    pub disk_usage: f64,
    pub active_users: i64,
    pub response_time: f64,
}

pub async fn insert_metric(
    db: &DatabaseConnection,
    project_id: i32,
    sample: NewSystemMetric,
) -> Result<system_metric::Model, DbErr> {
    system_metric::ActiveModel {
        project_id: Set(project_id),
        timestamp: Set(sample.timestamp),
        memory_usage: Set(sample.memory_usage),
        cpu_usage: Set(sample.cpu_usage),
        disk_usage: Set(sample.disk_usage),
        active_users: Set(sample.active_users),
        response_time: Set(sample.response_time),
        ..Default::default()
    }
    .insert(db)
    .await
}

/// Response times of the `limit` most recent samples, newest first.
pub async fn latest_response_times(
    db: &DatabaseConnection,
    project_id: i32,
    limit: u64,
) -> Result<Vec<f64>, DbErr> {
    system_metric::Entity::find()
        .select_only()
        .column(system_metric::Column::ResponseTime)
        .filter(system_metric::Column::ProjectId.eq(project_id))
        .order_by_desc(system_metric::Column::Timestamp)
        .order_by_desc(system_metric::Column::Id)
        .limit(limit)
        .into_tuple::<f64>()
        .all(db)
        .await
}
