//! Flash messages and paginated view models
//!
//! A flash message is the status line shown once after an action. Over a
//! JSON API it travels in the action's response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Warning,
            message: message.into(),
        }
    }

    /// Attach a payload, answering with `status`
    pub fn with_data<T: Serialize>(self, status: StatusCode, data: T) -> FlashResponse<T> {
        FlashResponse {
            status,
            body: FlashBody {
                flash: self,
                data: Some(data),
            },
        }
    }
}

impl IntoResponse for Flash {
    fn into_response(self) -> Response {
        let body: FlashBody<()> = FlashBody {
            flash: self,
            data: None,
        };
        (StatusCode::OK, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FlashBody<T> {
    pub flash: Flash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// A flash message plus the record it concerns
#[derive(Debug)]
pub struct FlashResponse<T> {
    status: StatusCode,
    body: FlashBody<T>,
}

impl<T: Serialize> IntoResponse for FlashResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Highest page number a listing query asks for
pub const MAX_PAGE: u64 = 1_000_000;

/// `?page=` query parameter, 1-based
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u64>,
}

impl PageQuery {
    /// Zero-based page index, clamped to `MAX_PAGE`
    pub fn index(&self) -> u64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE) - 1
    }
}

/// One page of a listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page_index: u64, per_page: u64, total: u64) -> Self {
        let last_page = if per_page == 0 {
            1
        } else {
            total.div_ceil(per_page).max(1)
        };
        Self {
            items,
            page: page_index.saturating_add(1),
            per_page,
            total,
            last_page,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flash_serializes_lowercase_level() {
        let json = serde_json::to_value(Flash::warning("careful")).unwrap();
        assert_eq!(json["level"], "warning");
        assert_eq!(json["message"], "careful");
    }

    #[test]
    fn test_flash_body_omits_empty_data() {
        let body: FlashBody<()> = FlashBody {
            flash: Flash::success("done"),
            data: None,
        };
        let json = serde_json::to_value(body).unwrap();
        assert!(json.get("data").is_none());
        assert_eq!(json["flash"]["level"], "success");
    }

    #[test]
    fn test_flash_response_status() {
        let resp = Flash::success("created")
            .with_data(StatusCode::CREATED, serde_json::json!({ "id": 1 }))
            .into_response();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[test]
    fn test_page_query_index() {
        assert_eq!(PageQuery { page: None }.index(), 0);
        assert_eq!(PageQuery { page: Some(0) }.index(), 0);
        assert_eq!(PageQuery { page: Some(3) }.index(), 2);
    }

    #[test]
    fn test_page_query_index_is_clamped() {
        let huge = PageQuery { page: Some(u64::MAX) }.index();
        assert_eq!(huge, MAX_PAGE - 1);
        assert!(huge.checked_mul(15).is_some());

        let page: Page<i32> = Page::new(vec![], huge, 15, 3);
        assert_eq!(page.page, MAX_PAGE);
        assert!(page.items.is_empty());
    }

    #[test]
    fn test_page_last_page() {
        let page = Page::new(vec![1, 2], 0, 15, 31);
        assert_eq!(page.page, 1);
        assert_eq!(page.last_page, 3);

        let empty: Page<i32> = Page::new(vec![], 0, 15, 0);
        assert_eq!(empty.last_page, 1);

        let mapped = Page::new(vec![1, 2], 1, 2, 4).map(|n| n * 10);
        assert_eq!(mapped.items, vec![10, 20]);
        assert_eq!(mapped.page, 2);
    }
}
