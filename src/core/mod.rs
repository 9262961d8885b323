//! Core utilities: configuration, errors, logging, shared types,
//! input validation and activity analytics.

pub mod analytics;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod validation;

pub use error::{AppError, AppResult};
pub use logging::init_logger;
