//! Database pool, migrations and per-table managers
//!
//! Each table gets a thin module of plain functions taking a
//! `&rusqlite::Connection`; pooled connections deref-coerce into them.

pub mod activity_log;
pub mod binding_codes;
pub mod db;
pub mod drafts;
pub mod keywords;
pub mod media;
pub mod merchants;
pub mod migrations;
pub mod regions;
pub mod slots;
pub mod templates;

pub use db::{create_pool, get_connection, DbConnection, DbPool};
