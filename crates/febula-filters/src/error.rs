//! Chain resolution error types.

use febula_core::error::FebulaError;
use thiserror::Error;

/// Why a filter chain could not be walked to its anchor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("filter object {key} is missing from the chain")]
    MissingFilter { key: String },

    #[error("filter chain revisits {key}")]
    Cycle { key: String },
}

impl From<ChainError> for FebulaError {
    fn from(err: ChainError) -> Self {
        match err {
            ChainError::MissingFilter { key } => FebulaError::NotFound {
                entity: "filter object".into(),
                key,
            },
            ChainError::Cycle { key } => FebulaError::ChainCycleDetected { key },
        }
    }
}
