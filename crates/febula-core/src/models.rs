//! Domain models for Febula.
//!
//! These are the core types shared across all crates. Field names
//! serialize in the PascalCase wire form the table service and editing
//! clients exchange.

pub mod context;
pub mod filter_object;
pub mod filter_rule;
pub mod lifecycle;
pub mod resource;
