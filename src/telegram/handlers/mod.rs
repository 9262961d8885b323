//! Handler schema and endpoints

pub mod callbacks;
pub mod commands;
pub mod messages;
pub mod schema;
pub mod types;

pub use schema::schema;
pub use types::{HandlerDeps, HandlerError};
