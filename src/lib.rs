//! Shangbang - Telegram bot for merchant onboarding and directory listing
//!
//! This library provides all the core functionality for the Shangbang bot,
//! including the merchant onboarding dialog, binding-code issuance, region
//! and posting-slot administration, and activity analytics.
//!
//! # Module Structure
//!
//! - `core`: Configuration, errors, logging, shared types, validation, analytics
//! - `storage`: Database pool, migrations and per-table managers
//! - `onboarding`: The step-table flow interpreter for merchant registration
//! - `telegram`: Bot wiring, handler schema and admin panels

pub mod cli;
pub mod core;
pub mod onboarding;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use self::core::{config, AppError, AppResult};
pub use self::storage::{create_pool, get_connection, DbConnection, DbPool};
pub use self::telegram::{create_bot, schema, Bot, HandlerDeps};
