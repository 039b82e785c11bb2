//! Febula core: the filter-chain domain model, error taxonomy and the
//! repository traits the storage and engine crates meet at.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{FebulaError, FebulaResult};
