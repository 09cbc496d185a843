use thiserror::Error;

use crate::features::FeatureSchema;

/// Errors surfaced by the valuation pipeline.
///
/// Model loading problems (`ModelUnavailable`, `FeatureMismatch`, `InvalidArtifact`)
/// are absorbed by the predictors, which switch to their rule-based fallback.
/// Only `InvalidInput` escapes a valuation call.
#[derive(Debug, Error)]
pub enum ValuationError {
    #[error("model {model} unavailable: {reason}")]
    ModelUnavailable { model: String, reason: String },

    #[error("feature schema {schema} expects {expected} values, artifact provides {found}")]
    FeatureMismatch {
        schema: FeatureSchema,
        expected: usize,
        found: usize,
    },

    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, ValuationError>;
