//! Febula Database: SurrealDB connection management and repository
//! implementations.
//!
//! This crate provides:
//! - Connection management ([`DbManager`], [`DbConfig`])
//! - Schema initialization and migrations ([`run_migrations`])
//! - Error types ([`DbError`])
//! - The filter object, filter rule and resource schema tables
//!   ([`repository`])

mod connection;
mod error;
pub mod repository;
mod schema;

pub use connection::{DbConfig, DbManager};
pub use error::DbError;
pub use repository::{
    SurrealFilterObjectRepository, SurrealFilterRuleRepository, SurrealResourceCatalog,
};
pub use schema::{run_migrations, schema_v1};
