//! JobBoard Common Library
//!
//! Shared code for the job board services including:
//! - Database models, migrations and the repository
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Form validation, slugs and flash messages
//! - Picture storage
//! - Metrics and observability

pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod flash;
pub mod metrics;
pub mod slug;
pub mod uploads;
pub mod validation;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
