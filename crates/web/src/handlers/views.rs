//! JSON view models shared by the handlers

use jobboard_common::db::models::{Job, JobCategory, JobPicture, JobResume, User};
use serde::Serialize;

/// A job posting as shown to clients
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    pub title: String,
    pub slug: String,
    pub location: String,
    pub content: String,
    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub resume_count: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Job> for JobView {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            user_id: job.user_id,
            category_id: job.category_id,
            title: job.title,
            slug: job.slug,
            location: job.location,
            content: job.content,
            meta_title: job.meta_title,
            meta_description: job.meta_description,
            meta_keywords: job.meta_keywords,
            thumbnail: job.thumbnails,
            resume_count: job.resume_count,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub id: i32,
    pub name: String,
    pub sort_order: i32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

impl From<JobCategory> for CategoryView {
    fn from(category: JobCategory) -> Self {
        Self {
            id: category.id,
            name: category.name,
            sort_order: category.sort_order,
            status: category.cat_status,
            content: category.content,
            thumbnail: category.thumbnails,
        }
    }
}

/// Category entry of a select box
#[derive(Debug, Serialize)]
pub struct CategoryOption {
    pub id: i32,
    pub name: String,
}

impl From<JobCategory> for CategoryOption {
    fn from(category: JobCategory) -> Self {
        Self {
            id: category.id,
            name: category.name,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeView {
    pub id: i32,
    pub job_id: i32,
    pub content: String,
    pub created_at: String,
}

impl From<JobResume> for ResumeView {
    fn from(resume: JobResume) -> Self {
        Self {
            id: resume.id,
            job_id: resume.job_id,
            content: resume.content,
            created_at: resume.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PictureView {
    pub id: i32,
    pub job_id: i32,
    pub filename: String,
    pub url: String,
    pub thumbnail_url: String,
}

impl From<JobPicture> for PictureView {
    fn from(picture: JobPicture) -> Self {
        Self {
            url: format!("/uploads/jobs/{}", picture.filename),
            thumbnail_url: format!("/uploads/jobs_thumbnails/{}", picture.filename),
            id: picture.id,
            job_id: picture.job_id,
            filename: picture.filename,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i32,
    pub email: String,
    pub display_name: String,
    pub created_at: String,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_picture_urls() {
        let now = chrono::Utc::now().into();
        let view = PictureView::from(JobPicture {
            id: 3,
            filename: "10.00.00-abc.png".to_string(),
            job_id: 7,
            user_id: 1,
            created_at: now,
            updated_at: now,
        });
        assert_eq!(view.url, "/uploads/jobs/10.00.00-abc.png");
        assert_eq!(view.thumbnail_url, "/uploads/jobs_thumbnails/10.00.00-abc.png");
    }

    #[test]
    fn test_user_view_has_no_password() {
        let now = chrono::Utc::now().into();
        let json = serde_json::to_value(UserView::from(User {
            id: 1,
            email: "a@example.com".to_string(),
            display_name: "A".to_string(),
            password_hash: "$argon2id$...".to_string(),
            created_at: now,
            updated_at: now,
        }))
        .unwrap();
        assert!(json.get("password_hash").is_none());
    }
}
