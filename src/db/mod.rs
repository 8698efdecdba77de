pub mod entities;
pub mod enums;
pub mod services;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::info;

use crate::db::entities::{error_log, project, system_metric};

/// Opens the store at `database_url` and makes sure every table exists.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(max_connections)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;
    ensure_schema(&db).await?;
    Ok(db)
}

/// Creates the tables (and their indexes) described by the entities if they
/// are missing. Projects go first so the foreign keys resolve.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    create_table_for(db, project::Entity).await?;
    create_table_for(db, system_metric::Entity).await?;
    create_table_for(db, error_log::Entity).await?;
    info!(backend = ?db.get_database_backend(), "Database schema is ready.");
    Ok(())
}

async fn create_table_for<E>(db: &DatabaseConnection, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut table = schema.create_table_from_entity(entity);
    table.if_not_exists();
    db.execute(backend.build(&table)).await?;

    for mut index in schema.create_index_from_entity(entity) {
        index.if_not_exists();
        db.execute(backend.build(&index)).await?;
    }
    Ok(())
}

/// In-memory SQLite store with the schema applied, for tests.
#[cfg(test)]
pub(crate) async fn setup_test_db() -> DatabaseConnection {
    connect("sqlite::memory:", 1)
        .await
        .expect("Failed to set up in-memory database")
}
