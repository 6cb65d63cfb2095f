//! Job posting handlers for the account area
//!
//! Every route here needs a signed-in user and only ever touches that
//! user's own postings.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use validator::Validate;

use super::views::{CategoryOption, JobView, PictureView};
use crate::AppState;
use jobboard_common::{
    auth::AuthUser,
    db::{models::Job, JobFields, JobFilter, JobSort, Repository, SortColumn},
    errors::{AppError, Result},
    flash::{Flash, FlashResponse, Page, PageQuery},
    metrics, slug,
    validation::{self, escape_html, non_blank, FieldErrors},
};

/// Jobs per page of the owner's list
pub const PER_PAGE: u64 = 15;

const CREATED: &str =
    "Job posting created: you can continue adding job postings, or return to the job posting list.";
const UPDATED: &str =
    "Job posting updated: you can continue editing, or return to the job posting list.";
const DELETED: &str = "Job posting deleted.";

// ============================================================================
// Form
// ============================================================================

/// Submitted job posting, shared by store and update
#[derive(Debug, Default, Deserialize, Validate)]
pub struct JobForm {
    #[validate(required(message = "Please enter a title."))]
    pub title: Option<String>,

    #[validate(required(message = "Please choose a location."))]
    pub location: Option<String>,

    #[validate(required(message = "Please enter the content."))]
    pub content: Option<String>,

    #[validate(required(message = "Please choose a valid category."))]
    pub category: Option<i32>,
}

const FIELD_ORDER: &[&str] = &["title", "location", "content", "category"];

impl JobForm {
    /// Trim text fields, treating blank input as missing
    pub fn normalized(self) -> Self {
        Self {
            title: non_blank(self.title),
            location: non_blank(self.location),
            content: non_blank(self.content),
            category: self.category,
        }
    }

    /// Rules that need no database
    pub fn check(&self) -> FieldErrors {
        validation::check(self, FIELD_ORDER)
    }

    /// Escaped column values, with the slug derived from the title
    fn into_fields(self, category_id: i32) -> JobFields {
        let raw_title = self.title.as_deref().unwrap_or_default();
        let title = escape_html(raw_title);
        JobFields {
            category_id,
            slug: slug::job_slug(raw_title, slug::now()),
            location: escape_html(self.location.as_deref().unwrap_or_default()),
            content: escape_html(self.content.as_deref().unwrap_or_default()),
            meta_title: title.clone(),
            meta_description: title.clone(),
            meta_keywords: title.clone(),
            title,
        }
    }
}

/// Validate a job form; `editing` is the id of the job being updated.
///
/// The database is only consulted once the declarative rules pass.
pub async fn validate_job(
    repo: &Repository,
    form: JobForm,
    editing: Option<i32>,
) -> Result<JobFields> {
    let form = form.normalized();
    form.check().into_result()?;

    let mut errors = FieldErrors::default();

    let escaped_title = escape_html(form.title.as_deref().unwrap_or_default());
    if repo.title_taken(&escaped_title, editing).await? {
        errors.add("title", validation::TITLE_TAKEN);
    }

    let category_id = form.category.unwrap_or_default();
    if repo.find_category(category_id).await?.is_none() {
        errors.add("category", validation::CATEGORY_INVALID);
    }

    errors.into_result()?;

    let fields = form.into_fields(category_id);
    if repo.slug_taken(&fields.slug, editing).await? {
        let mut errors = FieldErrors::default();
        errors.add("slug", validation::SLUG_TAKEN);
        return Err(AppError::InvalidForm { errors });
    }

    Ok(fields)
}

/// Load a live job the signed-in user owns
pub async fn owned_job(repo: &Repository, id: i32, auth: &AuthUser) -> Result<Job> {
    let job = repo
        .find_job(id)
        .await?
        .ok_or_else(|| AppError::JobNotFound { id: id.to_string() })?;

    if !job.is_owned_by(auth.user_id) {
        return Err(AppError::Forbidden {
            message: "This job posting belongs to another account.".to_string(),
        });
    }

    Ok(job)
}

async fn category_options(repo: &Repository) -> Result<Vec<CategoryOption>> {
    Ok(repo
        .list_categories()
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

// ============================================================================
// Listing
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct IndexQuery {
    pub sort_up: Option<String>,
    pub sort_down: Option<String>,
    pub target: Option<String>,
    pub like: Option<String>,
    pub page: Option<u64>,
}

impl IndexQuery {
    /// Sort and search parameters; unknown sort columns are rejected
    pub fn filter(&self) -> Result<JobFilter> {
        let sort = match (self.sort_up.as_deref(), self.sort_down.as_deref()) {
            (Some(column), _) => JobSort {
                column: column.parse::<SortColumn>()?,
                ascending: true,
            },
            (None, Some(column)) => JobSort {
                column: column.parse::<SortColumn>()?,
                ascending: false,
            },
            (None, None) => JobSort::default(),
        };

        let title_like = match self.target.as_deref() {
            Some("title") => non_blank(self.like.clone()),
            _ => None,
        };

        Ok(JobFilter { sort, title_like })
    }

    fn page_index(&self) -> u64 {
        PageQuery { page: self.page }.index()
    }
}

#[derive(Serialize)]
pub struct IndexResponse {
    pub jobs: Page<JobView>,
    pub sort: JobSort,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub like: Option<String>,
}

/// The signed-in user's job postings
pub async fn index(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<IndexQuery>,
) -> Result<Json<IndexResponse>> {
    let filter = query.filter()?;
    let page = query.page_index();

    let repo = Repository::new(state.db.clone());
    let (jobs, total) = repo
        .list_user_jobs(auth.user_id, &filter, page, PER_PAGE)
        .await?;

    debug!(user_id = auth.user_id, total, "Listed account jobs");

    Ok(Json(IndexResponse {
        jobs: Page::new(jobs, page, PER_PAGE, total).map(JobView::from),
        sort: filter.sort,
        like: filter.title_like,
    }))
}

// ============================================================================
// Create / edit
// ============================================================================

#[derive(Serialize)]
pub struct CreateResponse {
    pub categories: Vec<CategoryOption>,
}

/// Data for the new posting form
pub async fn create(State(state): State<AppState>, _auth: AuthUser) -> Result<Json<CreateResponse>> {
    let repo = Repository::new(state.db.clone());

    Ok(Json(CreateResponse {
        categories: category_options(&repo).await?,
    }))
}

/// Publish a new job posting
pub async fn store(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(form): Json<JobForm>,
) -> Result<FlashResponse<JobView>> {
    let repo = Repository::new(state.db.clone());
    let fields = validate_job(&repo, form, None).await?;

    let job = repo
        .create_job(auth.user_id, fields)
        .await
        .map_err(|e| e.into_persistence("Failed to create job posting."))?;

    metrics::record_job_write("created");
    info!(job_id = job.id, user_id = auth.user_id, slug = %job.slug, "Job posting created");

    Ok(Flash::success(CREATED).with_data(StatusCode::CREATED, job.into()))
}

#[derive(Serialize)]
pub struct EditResponse {
    pub job: JobView,
    pub categories: Vec<CategoryOption>,
    pub pictures: Vec<PictureView>,
}

/// Data for the edit form
pub async fn edit(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Json<EditResponse>> {
    let repo = Repository::new(state.db.clone());
    let job = owned_job(&repo, id, &auth).await?;
    let pictures = repo.list_job_pictures(job.id).await?;

    Ok(Json(EditResponse {
        job: job.into(),
        categories: category_options(&repo).await?,
        pictures: pictures.into_iter().map(Into::into).collect(),
    }))
}

/// Save changes to a job posting
pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
    Json(form): Json<JobForm>,
) -> Result<FlashResponse<JobView>> {
    let repo = Repository::new(state.db.clone());
    let job = owned_job(&repo, id, &auth).await?;
    let fields = validate_job(&repo, form, Some(job.id)).await?;

    let job = repo
        .update_job(job, fields)
        .await
        .map_err(|e| e.into_persistence("Failed to update job posting."))?;

    metrics::record_job_write("updated");
    info!(job_id = job.id, user_id = auth.user_id, "Job posting updated");

    Ok(Flash::success(UPDATED).with_data(StatusCode::OK, job.into()))
}

/// Remove a job posting and its thumbnail
pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Flash> {
    let repo = Repository::new(state.db.clone());
    let job = owned_job(&repo, id, &auth).await?;

    if let Some(ref thumbnail) = job.thumbnails {
        state.uploads.delete_thumbnail(thumbnail).await?;
    }

    let job_id = job.id;
    repo.soft_delete_job(job)
        .await
        .map_err(|e| e.into_persistence("Failed to delete job posting."))?;

    metrics::record_job_write("deleted");
    info!(job_id, user_id = auth.user_id, "Job posting deleted");

    Ok(Flash::success(DELETED))
}
