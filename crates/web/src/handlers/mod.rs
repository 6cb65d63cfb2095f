//! API handlers module

pub mod auth;
pub mod categories;
pub mod health;
pub mod jobs;
pub mod listings;
pub mod resumes;
pub mod uploads;
pub mod views;
