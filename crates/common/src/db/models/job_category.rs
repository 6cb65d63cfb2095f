//! Job category entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whether a category accepts new postings
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryStatus {
    Open,
    #[default]
    Close,
}

impl CategoryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryStatus::Open => "open",
            CategoryStatus::Close => "close",
        }
    }
}

impl From<String> for CategoryStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "open" => CategoryStatus::Open,
            _ => CategoryStatus::Close,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "job_categories")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(column_type = "Text")]
    pub name: String,

    pub sort_order: i32,

    /// `open` or `close`
    #[sea_orm(column_type = "Text")]
    pub cat_status: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub content: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub thumbnails: Option<String>,

    pub deleted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn status(&self) -> CategoryStatus {
        CategoryStatus::from(self.cat_status.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::job::Entity")]
    Jobs,
}

impl Related<super::job::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Jobs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
