//! Common utilities shared by the identity services.
//!
//! This crate provides:
//! - Unified service-level error handling
//! - Configuration structures and env helpers
//! - Pagination, deadlines and tracing bootstrap

pub mod config;
pub mod deadline;
pub mod error;
pub mod pagination;
pub mod telemetry;

pub use config::*;
pub use deadline::with_deadline;
pub use error::{AppError, AppResult, OptionExt};
pub use pagination::{Page, PageRequest};
pub use telemetry::init_tracing;
