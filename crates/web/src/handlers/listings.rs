//! Public job listings

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::views::{CategoryView, JobView, PictureView, ResumeView};
use crate::AppState;
use jobboard_common::{
    auth::AuthUser,
    db::Repository,
    errors::{AppError, Result},
    flash::{Flash, FlashResponse, Page, PageQuery},
    metrics,
    validation::resume_content,
};

/// Jobs per page of the front page
pub const INDEX_PER_PAGE: u64 = 12;
/// Categories shown on the front page
pub const INDEX_CATEGORIES: u64 = 6;
/// Jobs per page of a category page
pub const CATEGORY_PER_PAGE: u64 = 6;

fn views<T, V: From<T>>(items: Vec<T>) -> Vec<V> {
    items.into_iter().map(V::from).collect()
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub jobs: Page<JobView>,
    pub categories: Vec<CategoryView>,
}

/// Newest jobs and the leading categories
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<IndexResponse>> {
    let repo = Repository::new(state.db.clone());
    let page = query.index();

    let (jobs, total) = repo.list_jobs(page, INDEX_PER_PAGE).await?;
    let categories = repo.list_categories_limited(INDEX_CATEGORIES).await?;

    Ok(Json(IndexResponse {
        jobs: Page::new(jobs, page, INDEX_PER_PAGE, total).map(JobView::from),
        categories: views(categories),
    }))
}

#[derive(Serialize)]
pub struct CategoryResponse {
    pub category: Option<CategoryView>,
    pub jobs: Page<JobView>,
    pub categories: Vec<CategoryView>,
}

/// Jobs of one category; an unknown category lists nothing
pub async fn category(
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CategoryResponse>> {
    let repo = Repository::new(state.db.clone());
    let page = query.index();

    let (jobs, total) = repo
        .list_jobs_in_category(id, page, CATEGORY_PER_PAGE)
        .await?;
    let categories = repo.list_categories().await?;
    let current = categories.iter().find(|c| c.id == id).cloned();

    Ok(Json(CategoryResponse {
        category: current.map(Into::into),
        jobs: Page::new(jobs, page, CATEGORY_PER_PAGE, total).map(JobView::from),
        categories: views(categories),
    }))
}

#[derive(Serialize)]
pub struct ShowResponse {
    pub job: JobView,
    pub pictures: Vec<PictureView>,
    pub categories: Vec<CategoryView>,
}

/// A single job posting by slug
pub async fn show(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ShowResponse>> {
    let repo = Repository::new(state.db.clone());

    let job = repo
        .find_job_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::JobNotFound { id: slug.clone() })?;
    let pictures = repo.list_job_pictures(job.id).await?;
    let categories = repo.list_categories().await?;

    Ok(Json(ShowResponse {
        job: job.into(),
        pictures: views(pictures),
        categories: views(categories),
    }))
}

#[derive(Debug, Deserialize)]
pub struct ResumeForm {
    pub content: Option<String>,
}

#[derive(Serialize)]
pub struct ResumeSubmitted {
    pub resume: ResumeView,
    pub resume_count: i32,
}

/// Apply to a job posting
pub async fn post_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(slug): Path<String>,
    Json(form): Json<ResumeForm>,
) -> Result<FlashResponse<ResumeSubmitted>> {
    let content = resume_content(form.content.as_deref())?;

    let repo = Repository::new(state.db.clone());
    let job = repo
        .find_job_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::JobNotFound { id: slug.clone() })?;

    let (resume, resume_count) = repo
        .create_resume(job.id, auth.user_id, content)
        .await
        .map_err(|e| e.into_persistence("Failed to submit resume."))?;

    metrics::record_resume_submitted();
    info!(job_id = job.id, user_id = auth.user_id, resume_count, "Resume submitted");

    Ok(Flash::success("Resume submitted.").with_data(
        StatusCode::CREATED,
        ResumeSubmitted {
            resume: resume.into(),
            resume_count,
        },
    ))
}
