//! Job picture upload handlers

use std::time::Instant;

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};

use super::jobs::owned_job;
use crate::AppState;
use jobboard_common::{
    auth::AuthUser,
    db::Repository,
    errors::{AppError, Result},
    flash::Flash,
    metrics,
};

/// Multipart field carrying the picture
pub const FILE_FIELD: &str = "file";

/// Bytes and client file name of the `file` field
async fn read_file_field(multipart: &mut Multipart) -> Result<(Vec<u8>, String)> {
    while let Some(field) = multipart.next_field().await.map_err(|e| AppError::InvalidUpload {
        message: e.body_text(),
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(|e| AppError::InvalidUpload {
            message: e.body_text(),
        })?;

        return Ok((bytes.to_vec(), name));
    }

    Err(AppError::InvalidUpload {
        message: "Please choose a file.".to_string(),
    })
}

fn plain_rejection(message: String) -> Response {
    (StatusCode::BAD_REQUEST, message).into_response()
}

/// Attach a picture to a job posting.
///
/// Rejected files answer 400 with the message as plain text. A stored
/// picture that cannot be recorded answers 400 with `"error"`.
pub async fn post_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
    mut multipart: Multipart,
) -> Result<Response> {
    let repo = Repository::new(state.db.clone());
    let job = owned_job(&repo, id, &auth).await?;

    let (bytes, original_name) = match read_file_field(&mut multipart).await {
        Ok(file) => file,
        Err(AppError::InvalidUpload { message }) => return Ok(plain_rejection(message)),
        Err(e) => return Err(e),
    };

    let start = Instant::now();
    let stored = match state.uploads.store_job_picture(bytes, &original_name).await {
        Ok(stored) => stored,
        Err(AppError::InvalidUpload { message }) => {
            metrics::record_upload(0.0, false);
            return Ok(plain_rejection(message));
        }
        Err(e) => {
            metrics::record_upload(0.0, false);
            return Err(e);
        }
    };

    let job_id = job.id;
    let recorded = async {
        let previous = repo.set_job_thumbnail(job, stored.filename.clone()).await?;
        if let Some(previous) = previous.filter(|p| *p != stored.filename) {
            state.uploads.delete_thumbnail(&previous).await?;
        }
        repo.create_picture(job_id, auth.user_id, stored.filename.clone())
            .await
    }
    .await;

    match recorded {
        Ok(picture) => {
            metrics::record_upload(start.elapsed().as_secs_f64(), true);
            info!(job_id, picture_id = picture.id, filename = %stored.filename, "Picture uploaded");
            Ok(Json("success").into_response())
        }
        Err(e) => {
            metrics::record_upload(0.0, false);
            warn!(job_id, error = %e, "Failed to record uploaded picture");
            Ok((StatusCode::BAD_REQUEST, Json("error")).into_response())
        }
    }
}

/// Delete one of the signed-in user's pictures
pub async fn delete_upload(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i32>,
) -> Result<Flash> {
    let repo = Repository::new(state.db.clone());

    let picture = repo
        .find_user_picture(id, auth.user_id)
        .await?
        .ok_or_else(|| AppError::PictureNotFound { id: id.to_string() })?;

    if !repo.delete_picture(picture.id).await? {
        return Err(AppError::PictureNotFound { id: id.to_string() });
    }
    state.uploads.delete_picture(&picture.filename).await?;

    info!(picture_id = picture.id, user_id = auth.user_id, "Picture deleted");

    Ok(Flash::success("Picture deleted."))
}
