//! Shared form validation helpers
//!
//! Every write handler follows the same sequence: normalize the submitted
//! form, run the declarative `validator` rules, add the checks that need
//! the database (uniqueness, foreign keys), then either persist or return
//! the collected field errors.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

use crate::errors::{AppError, Result};

pub const TITLE_REQUIRED: &str = "Please enter a title.";
pub const TITLE_TAKEN: &str = "A job with this title already exists.";
pub const LOCATION_REQUIRED: &str = "Please choose a location.";
pub const SLUG_TAKEN: &str = "A job with this slug already exists.";
pub const CONTENT_REQUIRED: &str = "Please enter the content.";
pub const CATEGORY_INVALID: &str = "Please choose a valid category.";
pub const RESUME_TOO_SHORT: &str = "Resume must be at least 3 characters.";
pub const NAME_REQUIRED: &str = "Please enter a name.";

/// Minimum resume length, counted in characters after escaping
pub const RESUME_MIN_CHARS: usize = 3;

/// A single field-level error message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field errors in the order the rules were evaluated
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(Vec<FieldError>);

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// First message overall
    pub fn first(&self) -> Option<&str> {
        self.0.first().map(|e| e.message.as_str())
    }

    /// First message recorded for `field`
    pub fn first_for(&self, field: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.message.as_str())
    }

    pub fn has(&self, field: &str) -> bool {
        self.first_for(field).is_some()
    }

    /// Convert `validator` output, ordering fields as listed in `order`.
    ///
    /// Fields missing from `order` are appended alphabetically.
    pub fn from_validation(errors: &ValidationErrors, order: &[&str]) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(name, _)| {
            let name: &str = name;
            let rank = order.iter().position(|o| *o == name).unwrap_or(order.len());
            (rank, name.to_string())
        });

        let mut out = FieldErrors::default();
        for (name, errs) in fields {
            let field: &str = &name;
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("The {} field is invalid.", field));
                out.add(field, message);
            }
        }
        out
    }

    /// `Ok(())` when empty, otherwise an `InvalidForm` error
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(AppError::InvalidForm { errors: self })
        }
    }
}

/// Run the declarative rules of a form and collect the messages.
pub fn check<T: Validate>(form: &T, order: &[&str]) -> FieldErrors {
    match form.validate() {
        Ok(()) => FieldErrors::default(),
        Err(errors) => FieldErrors::from_validation(&errors, order),
    }
}

/// Trim a submitted string, treating blank input as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// HTML-escape user supplied text before it is stored.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape resume content and enforce the minimum length.
pub fn resume_content(raw: Option<&str>) -> Result<String> {
    let content = escape_html(raw.unwrap_or_default());
    if content.chars().count() < RESUME_MIN_CHARS {
        let mut errors = FieldErrors::default();
        errors.add("content", RESUME_TOO_SHORT);
        return Err(AppError::InvalidForm { errors });
    }
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Validate)]
    struct Sample {
        #[validate(required(message = "Please enter a title."))]
        title: Option<String>,
        #[validate(required(message = "Please enter the content."))]
        content: Option<String>,
        #[validate(length(min = 2))]
        code: String,
    }

    #[test]
    fn test_from_validation_respects_order() {
        let form = Sample {
            title: None,
            content: None,
            code: "x".into(),
        };
        let errors = check(&form, &["title", "content"]);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.first(), Some(TITLE_REQUIRED));
        assert_eq!(errors.first_for("content"), Some(CONTENT_REQUIRED));
        assert_eq!(errors.first_for("code"), Some("The code field is invalid."));
    }

    #[test]
    fn test_valid_form_has_no_errors() {
        let form = Sample {
            title: Some("Rust engineer".into()),
            content: Some("Write services".into()),
            code: "ok".into(),
        };
        let errors = check(&form, &[]);
        assert!(errors.is_empty());
        assert!(errors.into_result().is_ok());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  hi ".into())), Some("hi".into()));
        assert_eq!(non_blank(Some("   ".into())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#039;Jerry&#039;&lt;/b&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_resume_content_length() {
        assert!(resume_content(Some("ab")).is_err());
        assert!(resume_content(None).is_err());
        assert_eq!(resume_content(Some("abc")).unwrap(), "abc");
        // escaping happens before the length check
        assert_eq!(resume_content(Some("<")).unwrap(), "&lt;");
        // characters, not bytes
        assert!(resume_content(Some("简历")).is_err());
        assert!(resume_content(Some("好简历")).is_ok());
    }

    #[test]
    fn test_into_result_carries_errors() {
        let mut errors = FieldErrors::default();
        errors.add("location", LOCATION_REQUIRED);
        match errors.into_result() {
            Err(AppError::InvalidForm { errors }) => {
                assert!(errors.has("location"));
                assert!(!errors.has("title"));
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
