//! Job posting entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Owner
    pub user_id: i32,

    pub category_id: i32,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text", unique)]
    pub slug: String,

    #[sea_orm(column_type = "Text")]
    pub location: String,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    #[sea_orm(column_type = "Text")]
    pub meta_title: String,

    #[sea_orm(column_type = "Text")]
    pub meta_description: String,

    #[sea_orm(column_type = "Text")]
    pub meta_keywords: String,

    /// File name of the current thumbnail under `jobs_thumbnails/`
    #[sea_orm(column_type = "Text", nullable)]
    pub thumbnails: Option<String>,

    pub resume_count: i32,

    pub deleted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn is_owned_by(&self, user_id: i32) -> bool {
        self.user_id == user_id
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::job_category::Entity",
        from = "Column::CategoryId",
        to = "super::job_category::Column::Id"
    )]
    Category,

    #[sea_orm(has_many = "super::job_resume::Entity")]
    Resumes,

    #[sea_orm(has_many = "super::job_picture::Entity")]
    Pictures,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::job_category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::job_resume::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Resumes.def()
    }
}

impl Related<super::job_picture::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pictures.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
