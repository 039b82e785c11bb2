//! Error types for the Febula system.
//!
//! Validation variants carry a message that already embeds the offending
//! payload, so callers can surface `to_string()` verbatim.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FebulaError {
    #[error("Scheme validation failed: {message}")]
    SchemaValidation { message: String },

    #[error("Name validation failed: {message}")]
    NameValidation { message: String },

    #[error("Resource validation failed: {message}")]
    ResourceValidation { message: String },

    #[error("Field validation failed: {message}")]
    FieldValidation { message: String },

    #[error("PreviousField validation failed: {message}")]
    PreviousFieldValidation { message: String },

    #[error("PreviousFilter validation failed: {message}")]
    PreviousFilterValidation { message: String },

    #[error("Profile and resource combination must be unique: {message}")]
    ProfileResourceUniqueness { message: String },

    #[error("Filter validation failed: {message}")]
    FilterValidation { message: String },

    #[error("Ownership validation failed: {message}")]
    OwnershipValidation { message: String },

    #[error("Filter chain cycle detected at key {key}")]
    ChainCycleDetected { key: String },

    #[error("Entity not found: {entity} with key {key}")]
    NotFound { entity: String, key: String },

    #[error("Resource catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Unsupported request: {0}")]
    UnsupportedRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FebulaError {
    /// True for the rejections produced by payload validation, as opposed
    /// to collaborator I/O failures.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            FebulaError::SchemaValidation { .. }
                | FebulaError::NameValidation { .. }
                | FebulaError::ResourceValidation { .. }
                | FebulaError::FieldValidation { .. }
                | FebulaError::PreviousFieldValidation { .. }
                | FebulaError::PreviousFilterValidation { .. }
                | FebulaError::ProfileResourceUniqueness { .. }
                | FebulaError::FilterValidation { .. }
                | FebulaError::OwnershipValidation { .. }
                | FebulaError::ChainCycleDetected { .. }
        )
    }
}

impl From<serde_json::Error> for FebulaError {
    fn from(err: serde_json::Error) -> Self {
        FebulaError::SchemaValidation {
            message: err.to_string(),
        }
    }
}

pub type FebulaResult<T> = Result<T, FebulaError>;
