//! Job category handlers

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use super::views::CategoryView;
use crate::AppState;
use jobboard_common::{
    auth::AuthUser,
    db::{models::CategoryStatus, NewCategory, Repository},
    errors::Result,
    flash::{Flash, FlashResponse},
    validation::{self, escape_html, non_blank},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryForm {
    #[validate(required(message = "Please enter a name."))]
    pub name: Option<String>,

    #[serde(default)]
    pub sort_order: i32,

    pub cat_status: Option<String>,

    pub content: Option<String>,
}

const FIELD_ORDER: &[&str] = &["name", "cat_status"];

/// Validate a category form into the row to insert
pub fn validate_category(form: CategoryForm) -> Result<NewCategory> {
    let form = CategoryForm {
        name: non_blank(form.name),
        content: non_blank(form.content),
        ..form
    };

    let mut errors = validation::check(&form, FIELD_ORDER);
    let status = match form.cat_status.as_deref().map(str::trim) {
        None | Some("") => CategoryStatus::default(),
        Some("open") => CategoryStatus::Open,
        Some("close") => CategoryStatus::Close,
        Some(_) => {
            errors.add("cat_status", "Status must be open or close.");
            CategoryStatus::default()
        }
    };
    errors.into_result()?;

    Ok(NewCategory {
        name: escape_html(form.name.as_deref().unwrap_or_default()),
        sort_order: form.sort_order,
        status,
        content: form.content.as_deref().map(escape_html),
    })
}

/// All categories by sort order
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<CategoryView>>> {
    let repo = Repository::new(state.db.clone());
    let categories = repo.list_categories().await?;

    Ok(Json(categories.into_iter().map(Into::into).collect()))
}

/// Add a category
pub async fn store(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(form): Json<CategoryForm>,
) -> Result<FlashResponse<CategoryView>> {
    let category = validate_category(form)?;

    let repo = Repository::new(state.db.clone());
    let created = repo
        .create_category(category)
        .await
        .map_err(|e| e.into_persistence("Failed to create category."))?;

    info!(category_id = created.id, user_id = auth.user_id, "Category created");

    Ok(Flash::success("Category created.").with_data(StatusCode::CREATED, created.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: Option<&str>, status: Option<&str>) -> CategoryForm {
        CategoryForm {
            name: name.map(str::to_string),
            sort_order: 2,
            cat_status: status.map(str::to_string),
            content: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_valid_category() {
        let category = validate_category(form(Some("R&D"), Some("open"))).unwrap();
        assert_eq!(category.name, "R&amp;D");
        assert_eq!(category.status, CategoryStatus::Open);
        assert_eq!(category.sort_order, 2);
        assert!(category.content.is_none());
    }

    #[test]
    fn test_status_defaults_to_close() {
        let category = validate_category(form(Some("Sales"), None)).unwrap();
        assert_eq!(category.status, CategoryStatus::Close);
    }

    #[test]
    fn test_blank_name_and_bad_status() {
        let err = validate_category(form(Some("   "), Some("maybe"))).unwrap_err();
        match err {
            jobboard_common::AppError::InvalidForm { errors } => {
                assert_eq!(errors.first_for("name"), Some("Please enter a name."));
                assert!(errors.has("cat_status"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
