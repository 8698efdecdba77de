use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::db::enums::ProjectStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "projects")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub owner_id: String,
    pub name: String,
    pub url: String,
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub api_key: String,
    pub status: ProjectStatus,
    pub created_at: ChronoDateTimeUtc,
    pub updated_at: ChronoDateTimeUtc,
    pub last_ping: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::system_metric::Entity")]
    SystemMetric,
    #[sea_orm(has_many = "super::error_log::Entity")]
    ErrorLog,
}

impl Related<super::system_metric::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SystemMetric.def()
    }
}

impl Related<super::error_log::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ErrorLog.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
