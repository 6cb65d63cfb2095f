//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations with proper
//! error handling and transaction support. Soft-deleted jobs and categories
//! are filtered out of every read.

use std::str::FromStr;

use crate::db::models::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    Order, Paginator, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, SelectorTrait, Set,
    Statement, TransactionTrait,
};
use serde::Serialize;

/// Columns the owner's job list may be sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    CreatedAt,
    UpdatedAt,
    Title,
    Location,
    ResumeCount,
}

impl SortColumn {
    fn column(&self) -> JobColumn {
        match self {
            SortColumn::CreatedAt => JobColumn::CreatedAt,
            SortColumn::UpdatedAt => JobColumn::UpdatedAt,
            SortColumn::Title => JobColumn::Title,
            SortColumn::Location => JobColumn::Location,
            SortColumn::ResumeCount => JobColumn::ResumeCount,
        }
    }
}

impl FromStr for SortColumn {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "created_at" => Ok(SortColumn::CreatedAt),
            "updated_at" => Ok(SortColumn::UpdatedAt),
            "title" => Ok(SortColumn::Title),
            "location" => Ok(SortColumn::Location),
            "resume_count" => Ok(SortColumn::ResumeCount),
            other => Err(AppError::Validation {
                message: format!("Cannot sort by '{}'", other),
                field: Some("sort".to_string()),
            }),
        }
    }
}

/// Sort order of a job listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobSort {
    pub column: SortColumn,
    pub ascending: bool,
}

impl Default for JobSort {
    fn default() -> Self {
        Self {
            column: SortColumn::CreatedAt,
            ascending: false,
        }
    }
}

impl JobSort {
    fn order(&self) -> Order {
        if self.ascending {
            Order::Asc
        } else {
            Order::Desc
        }
    }
}

/// Filters for the owner's job list
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub sort: JobSort,
    /// Substring the title must contain
    pub title_like: Option<String>,
}

/// Validated and escaped job fields, as written on create and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFields {
    pub category_id: i32,
    pub title: String,
    pub slug: String,
    pub location: String,
    pub content: String,
    pub meta_title: String,
    pub meta_description: String,
    pub meta_keywords: String,
}

/// A category to insert
#[derive(Debug, Clone)]
pub struct NewCategory {
    pub name: String,
    pub sort_order: i32,
    pub status: CategoryStatus,
    pub content: Option<String>,
}

/// Whether zero-based `page` of `per_page` rows starts before the end of `total` rows.
///
/// Pages past the end, including offsets that would overflow, hold nothing.
pub fn page_in_range(page: u64, per_page: u64, total: u64) -> bool {
    match page.checked_mul(per_page) {
        Some(offset) => offset < total,
        None => false,
    }
}

/// Count and fetch one page, skipping the row query for pages past the end
async fn fetch_page<'db, C, S>(
    paginator: Paginator<'db, C, S>,
    page: u64,
    per_page: u64,
) -> Result<(Vec<S::Item>, u64)>
where
    C: ConnectionTrait,
    S: SelectorTrait + 'db,
{
    let total = paginator.num_items().await?;
    if !page_in_range(page, per_page, total) {
        return Ok((Vec::new(), total));
    }

    let items = paginator.fetch_page(page).await?;
    Ok((items, total))
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a user account
    pub async fn create_user(
        &self,
        email: String,
        display_name: String,
        password_hash: String,
    ) -> Result<User> {
        let now = chrono::Utc::now();

        let user = UserActiveModel {
            email: Set(email),
            display_name: Set(display_name),
            password_hash: Set(password_hash),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find user by email
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: i32) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Category Operations
    // ========================================================================

    /// All live categories by sort order
    pub async fn list_categories(&self) -> Result<Vec<JobCategory>> {
        Self::categories_query()
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// The first `limit` categories by sort order
    pub async fn list_categories_limited(&self, limit: u64) -> Result<Vec<JobCategory>> {
        Self::categories_query()
            .limit(limit)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    fn categories_query() -> sea_orm::Select<JobCategoryEntity> {
        JobCategoryEntity::find()
            .filter(JobCategoryColumn::DeletedAt.is_null())
            .order_by_asc(JobCategoryColumn::SortOrder)
            .order_by_asc(JobCategoryColumn::Id)
    }

    /// Find a live category by ID
    pub async fn find_category(&self, id: i32) -> Result<Option<JobCategory>> {
        JobCategoryEntity::find_by_id(id)
            .filter(JobCategoryColumn::DeletedAt.is_null())
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Create a category
    pub async fn create_category(&self, category: NewCategory) -> Result<JobCategory> {
        let now = chrono::Utc::now();

        let model = JobCategoryActiveModel {
            name: Set(category.name),
            sort_order: Set(category.sort_order),
            cat_status: Set(category.status.as_str().to_string()),
            content: Set(category.content),
            thumbnails: Set(None),
            deleted_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        model.insert(self.write_conn()).await.map_err(Into::into)
    }

    // ========================================================================
    // Job Operations
    // ========================================================================

    fn live_jobs() -> sea_orm::Select<JobEntity> {
        JobEntity::find().filter(JobColumn::DeletedAt.is_null())
    }

    /// Find a live job by ID
    pub async fn find_job(&self, id: i32) -> Result<Option<Job>> {
        Self::live_jobs()
            .filter(JobColumn::Id.eq(id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a live job by slug
    pub async fn find_job_by_slug(&self, slug: &str) -> Result<Option<Job>> {
        Self::live_jobs()
            .filter(JobColumn::Slug.eq(slug))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Whether a live job other than `excluding` already uses `title`
    pub async fn title_taken(&self, title: &str, excluding: Option<i32>) -> Result<bool> {
        let mut query = Self::live_jobs().filter(JobColumn::Title.eq(title));
        if let Some(id) = excluding {
            query = query.filter(JobColumn::Id.ne(id));
        }
        Ok(query.count(self.read_conn()).await? > 0)
    }

    /// Whether a job other than `excluding` already uses `slug`
    pub async fn slug_taken(&self, slug: &str, excluding: Option<i32>) -> Result<bool> {
        let mut query = JobEntity::find().filter(JobColumn::Slug.eq(slug));
        if let Some(id) = excluding {
            query = query.filter(JobColumn::Id.ne(id));
        }
        Ok(query.count(self.read_conn()).await? > 0)
    }

    /// List an owner's jobs with sorting, title search and pagination
    pub async fn list_user_jobs(
        &self,
        user_id: i32,
        filter: &JobFilter,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Job>, u64)> {
        let mut query = Self::live_jobs().filter(JobColumn::UserId.eq(user_id));
        if let Some(ref like) = filter.title_like {
            query = query.filter(JobColumn::Title.contains(like.as_str()));
        }

        let paginator = query
            .order_by(filter.sort.column.column(), filter.sort.order())
            .order_by_desc(JobColumn::Id)
            .paginate(self.read_conn(), per_page);

        fetch_page(paginator, page, per_page).await
    }

    /// Newest live jobs
    pub async fn list_jobs(&self, page: u64, per_page: u64) -> Result<(Vec<Job>, u64)> {
        let paginator = Self::live_jobs()
            .order_by_desc(JobColumn::CreatedAt)
            .order_by_desc(JobColumn::Id)
            .paginate(self.read_conn(), per_page);

        fetch_page(paginator, page, per_page).await
    }

    /// Newest live jobs of one category
    pub async fn list_jobs_in_category(
        &self,
        category_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<Job>, u64)> {
        let paginator = Self::live_jobs()
            .filter(JobColumn::CategoryId.eq(category_id))
            .order_by_desc(JobColumn::CreatedAt)
            .order_by_desc(JobColumn::Id)
            .paginate(self.read_conn(), per_page);

        fetch_page(paginator, page, per_page).await
    }

    /// Create a job owned by `user_id`
    pub async fn create_job(&self, user_id: i32, fields: JobFields) -> Result<Job> {
        let now = chrono::Utc::now();

        let job = JobActiveModel {
            user_id: Set(user_id),
            category_id: Set(fields.category_id),
            title: Set(fields.title),
            slug: Set(fields.slug),
            location: Set(fields.location),
            content: Set(fields.content),
            meta_title: Set(fields.meta_title),
            meta_description: Set(fields.meta_description),
            meta_keywords: Set(fields.meta_keywords),
            thumbnails: Set(None),
            resume_count: Set(0),
            deleted_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        job.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Overwrite the editable fields of a job
    pub async fn update_job(&self, job: Job, fields: JobFields) -> Result<Job> {
        let mut active: JobActiveModel = job.into();

        active.category_id = Set(fields.category_id);
        active.title = Set(fields.title);
        active.slug = Set(fields.slug);
        active.location = Set(fields.location);
        active.content = Set(fields.content);
        active.meta_title = Set(fields.meta_title);
        active.meta_description = Set(fields.meta_description);
        active.meta_keywords = Set(fields.meta_keywords);
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Point a job at a new thumbnail, returning the previous file name
    pub async fn set_job_thumbnail(&self, job: Job, filename: String) -> Result<Option<String>> {
        let previous = job.thumbnails.clone();
        let mut active: JobActiveModel = job.into();

        active.thumbnails = Set(Some(filename));
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(self.write_conn()).await?;

        Ok(previous)
    }

    /// Soft-delete a job
    pub async fn soft_delete_job(&self, job: Job) -> Result<()> {
        let now = chrono::Utc::now();
        let mut active: JobActiveModel = job.into();

        active.deleted_at = Set(Some(now.into()));
        active.updated_at = Set(now.into());
        active.update(self.write_conn()).await?;

        Ok(())
    }

    // ========================================================================
    // Resume Operations
    // ========================================================================

    /// Store a resume and refresh the job's resume count in one transaction.
    ///
    /// Returns the resume and the new count.
    pub async fn create_resume(
        &self,
        job_id: i32,
        user_id: i32,
        content: String,
    ) -> Result<(JobResume, i32)> {
        let now = chrono::Utc::now();
        let txn = self.write_conn().begin().await?;

        // concurrent submissions for one job queue up on its row
        let locked = Self::live_jobs()
            .filter(JobColumn::Id.eq(job_id))
            .lock_exclusive()
            .one(&txn)
            .await?;
        if locked.is_none() {
            return Err(AppError::JobNotFound {
                id: job_id.to_string(),
            });
        }

        let resume = JobResumeActiveModel {
            content: Set(content),
            job_id: Set(job_id),
            user_id: Set(user_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            UPDATE jobs
            SET resume_count = (SELECT COUNT(*) FROM job_resumes WHERE job_id = $1)
            WHERE id = $1
            RETURNING resume_count
            "#,
            vec![job_id.into()],
        );

        let count = match txn.query_one(stmt).await? {
            Some(row) => row.try_get::<i32>("", "resume_count")?,
            None => {
                return Err(AppError::JobNotFound {
                    id: job_id.to_string(),
                })
            }
        };

        txn.commit().await?;

        Ok((resume, count))
    }

    /// A user's own resumes, newest first
    pub async fn list_user_resumes(
        &self,
        user_id: i32,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<JobResume>, u64)> {
        let paginator = JobResumeEntity::find()
            .filter(JobResumeColumn::UserId.eq(user_id))
            .order_by_desc(JobResumeColumn::CreatedAt)
            .order_by_desc(JobResumeColumn::Id)
            .paginate(self.read_conn(), per_page);

        fetch_page(paginator, page, per_page).await
    }

    /// Find a resume only if it belongs to `user_id`
    pub async fn find_user_resume(&self, id: i32, user_id: i32) -> Result<Option<JobResume>> {
        JobResumeEntity::find_by_id(id)
            .filter(JobResumeColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete resume by ID
    pub async fn delete_resume(&self, id: i32) -> Result<bool> {
        let result = JobResumeEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }

    // ========================================================================
    // Picture Operations
    // ========================================================================

    /// Record an uploaded picture
    pub async fn create_picture(
        &self,
        job_id: i32,
        user_id: i32,
        filename: String,
    ) -> Result<JobPicture> {
        let now = chrono::Utc::now();

        let picture = JobPictureActiveModel {
            filename: Set(filename),
            job_id: Set(job_id),
            user_id: Set(user_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
            ..Default::default()
        };

        picture.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Pictures of a job, oldest first
    pub async fn list_job_pictures(&self, job_id: i32) -> Result<Vec<JobPicture>> {
        JobPictureEntity::find()
            .filter(JobPictureColumn::JobId.eq(job_id))
            .order_by_asc(JobPictureColumn::Id)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find a picture only if `user_id` uploaded it
    pub async fn find_user_picture(&self, id: i32, user_id: i32) -> Result<Option<JobPicture>> {
        JobPictureEntity::find_by_id(id)
            .filter(JobPictureColumn::UserId.eq(user_id))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete picture by ID
    pub async fn delete_picture(&self, id: i32) -> Result<bool> {
        let result = JobPictureEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}
