//! SeaORM entity models
//!
//! Database entities for the job board

mod job;
mod job_category;
mod job_picture;
mod job_resume;
mod user;

pub use job::{
    ActiveModel as JobActiveModel,
    Column as JobColumn,
    Entity as JobEntity,
    Model as Job,
};

pub use job_category::{
    ActiveModel as JobCategoryActiveModel,
    CategoryStatus,
    Column as JobCategoryColumn,
    Entity as JobCategoryEntity,
    Model as JobCategory,
};

pub use job_resume::{
    ActiveModel as JobResumeActiveModel,
    Column as JobResumeColumn,
    Entity as JobResumeEntity,
    Model as JobResume,
};

pub use job_picture::{
    ActiveModel as JobPictureActiveModel,
    Column as JobPictureColumn,
    Entity as JobPictureEntity,
    Model as JobPicture,
};

pub use user::{
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    Entity as UserEntity,
    Model as User,
};
