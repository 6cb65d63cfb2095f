//! The signed-in user's submitted resumes

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::info;

use super::views::ResumeView;
use crate::AppState;
use jobboard_common::{
    auth::AuthUser,
    db::Repository,
    errors::{AppError, Result},
    flash::{Flash, Page, PageQuery},
};

/// Resumes per page
pub const PER_PAGE: u64 = 15;

pub async fn index(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
) -> Result<Json<Page<ResumeView>>> {
    let repo = Repository::new(state.db.clone());
    let page = query.index();

    let (resumes, total) = repo
        .list_user_resumes(auth.user_id, page, PER_PAGE)
        .await?;

    Ok(Json(
        Page::new(resumes, page, PER_PAGE, total).map(ResumeView::from),
    ))
}

/// Withdraw one of the signed-in user's resumes
pub async fn destroy(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Flash> {
    let repo = Repository::new(state.db.clone());

    let resume = repo
        .find_user_resume(id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::ResumeNotFound { id: id.to_string() })?;

    if !repo.delete_resume(resume.id).await? {
        return Err(AppError::ResumeNotFound { id: id.to_string() });
    }

    info!(resume_id = resume.id, job_id = resume.job_id, user_id = auth.user_id, "Resume deleted");

    Ok(Flash::success("Resume deleted."))
}
