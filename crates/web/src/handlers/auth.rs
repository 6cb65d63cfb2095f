//! Account registration and sign-in

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use super::views::UserView;
use crate::AppState;
use jobboard_common::{
    auth::{hash_password, verify_password, AuthUser},
    db::Repository,
    errors::{AppError, Result},
    validation::FieldErrors,
};

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Please enter a valid email address."))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Please enter a name."))]
    pub display_name: String,

    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters."))]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

#[derive(Serialize)]
pub struct RegisterResponse {
    pub user: UserView,
    #[serde(flatten)]
    pub token: TokenResponse,
}

fn issue_token(state: &AppState, user_id: i32) -> Result<TokenResponse> {
    Ok(TokenResponse {
        token: state.jwt.generate_token(user_id)?,
        token_type: "Bearer",
        expires_in: state.jwt.expiration_secs(),
    })
}

/// Create an account and sign it in
pub async fn register(
    State(state): State<AppState>,
    Json(mut request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>)> {
    request.email = request.email.trim().to_lowercase();
    request.display_name = request.display_name.trim().to_string();

    if let Err(e) = request.validate() {
        return Err(AppError::InvalidForm {
            errors: FieldErrors::from_validation(&e, &["email", "display_name", "password"]),
        });
    }

    let repo = Repository::new(state.db.clone());

    if repo.find_user_by_email(&request.email).await?.is_some() {
        return Err(AppError::Duplicate {
            message: "An account with this email already exists.".to_string(),
        });
    }

    let password_hash = hash_password(&request.password)?;
    let user = repo
        .create_user(request.email, request.display_name, password_hash)
        .await
        .map_err(|e| e.into_persistence("Failed to create account."))?;

    info!(user_id = user.id, "Account registered");

    let token = issue_token(&state, user.id)?;
    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user: user.into(),
            token,
        }),
    ))
}

/// Exchange credentials for a bearer token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>> {
    let repo = Repository::new(state.db.clone());
    let email = request.email.trim().to_lowercase();

    let user = repo
        .find_user_by_email(&email)
        .await?
        .ok_or(AppError::InvalidCredentials)?;

    if !verify_password(&request.password, &user.password_hash) {
        return Err(AppError::InvalidCredentials);
    }

    info!(user_id = user.id, "Signed in");
    Ok(Json(issue_token(&state, user.id)?))
}

/// The signed-in account
pub async fn me(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserView>> {
    let repo = Repository::new(state.db.clone());

    let user = repo
        .find_user_by_id(auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound {
            resource_type: "user".to_string(),
            id: auth.user_id.to_string(),
        })?;

    Ok(Json(user.into()))
}
