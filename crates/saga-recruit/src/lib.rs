//! Applicant tracking for a student association's recruitment campaign.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;

pub use error::AppError;
