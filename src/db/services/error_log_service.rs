use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::db::entities::error_log;
use crate::db::enums::ErrorLevel;

/// One error record as received from a monitored application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewErrorLog {
    pub timestamp: DateTime<Utc>,
    pub level: ErrorLevel,
    pub message: String,
    pub file: String,
    pub line: i32,
    pub trace: String,
    pub user_id: Option<String>,
    pub ip_address: String,
    pub user_agent: String,
    pub request_url: String,
    pub request_method: String,
}

pub async fn insert_error_log(
    db: &DatabaseConnection,
    project_id: i32,
    record: NewErrorLog,
) -> Result<error_log::Model, DbErr> {
    error_log::ActiveModel {
        project_id: Set(project_id),
        timestamp: Set(record.timestamp),
        level: Set(record.level),
        message: Set(record.message),
        file: Set(record.file),
        line: Set(record.line),
        trace: Set(record.trace),
        // An empty user id means "nobody was logged in".
        user_id: Set(record.user_id.filter(|id| !id.is_empty())),
        ip_address: Set(record.ip_address),
        user_agent: Set(record.user_agent),
        request_url: Set(record.request_url),
        request_method: Set(record.request_method),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn count_errors_since(
    db: &DatabaseConnection,
    project_id: i32,
    since: DateTime<Utc>,
) -> Result<u64, DbErr> {
    error_log::Entity::find()
        .filter(error_log::Column::ProjectId.eq(project_id))
        .filter(error_log::Column::Timestamp.gte(since))
        .count(db)
        .await
}

/// The newest error recorded at or after `since`, if any.
pub async fn latest_error_since(
    db: &DatabaseConnection,
    project_id: i32,
    since: DateTime<Utc>,
) -> Result<Option<error_log::Model>, DbErr> {
    error_log::Entity::find()
        .filter(error_log::Column::ProjectId.eq(project_id))
        .filter(error_log::Column::Timestamp.gte(since))
        .order_by_desc(error_log::Column::Timestamp)
        .order_by_desc(error_log::Column::Id)
        .one(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::services::project_service::create_project;
    use crate::db::setup_test_db;
    use chrono::Duration;

    fn record_at(timestamp: DateTime<Utc>, message: &str) -> NewErrorLog {
        NewErrorLog {
            timestamp,
            level: ErrorLevel::Error,
            message: message.to_string(),
            file: "src/orders.rs".to_string(),
            line: 42,
            trace: "#0 main".to_string(),
            user_id: Some(String::new()),
            ip_address: "10.0.0.1".to_string(),
            user_agent: "curl/8.0".to_string(),
            request_url: "https://shop.test/orders".to_string(),
            request_method: "POST".to_string(),
        }
    }

    #[tokio::test]
    async fn test_empty_user_id_is_stored_as_null() {
        let db = setup_test_db().await;
        let project = create_project(&db, "owner", "App", "https://app.test").await.unwrap();
        let stored = insert_error_log(&db, project.id, record_at(Utc::now(), "boom"))
            .await
            .unwrap();
        assert_eq!(stored.user_id, None);
        assert_eq!(stored.level, ErrorLevel::Error);
    }

    #[tokio::test]
    async fn test_count_and_latest_since() {
        let db = setup_test_db().await;
        let project = create_project(&db, "owner", "App", "https://app.test").await.unwrap();
        let now = Utc::now();

        insert_error_log(&db, project.id, record_at(now - Duration::days(2), "old")).await.unwrap();
        insert_error_log(&db, project.id, record_at(now - Duration::minutes(10), "first")).await.unwrap();
        insert_error_log(&db, project.id, record_at(now - Duration::minutes(1), "second")).await.unwrap();

        let since = now - Duration::hours(1);
        assert_eq!(count_errors_since(&db, project.id, since).await.unwrap(), 2);
        let latest = latest_error_since(&db, project.id, since).await.unwrap().unwrap();
        assert_eq!(latest.message, "second");
        assert!(latest_error_since(&db, project.id, now + Duration::hours(1))
            .await
            .unwrap()
            .is_none());
    }
}
