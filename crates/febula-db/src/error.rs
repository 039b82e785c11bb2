//! Database-specific error types and conversions.

use febula_core::error::FebulaError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Record not found: {entity} with key {key}")]
    NotFound { entity: String, key: String },

    #[error("Stored row could not be decoded: {0}")]
    Decode(String),
}

impl From<DbError> for FebulaError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, key } => FebulaError::NotFound { entity, key },
            other => FebulaError::StoreUnavailable(other.to_string()),
        }
    }
}
