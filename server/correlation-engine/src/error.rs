//! Structured error types for the correlation engine.
//!
//! Duplicate suppression is not an error and has no variant here; it is a
//! normal, silent outcome of the deduplicator.

use thiserror::Error;

/// Errors surfaced to the ingesting caller.
#[derive(Debug, Error)]
pub enum EngineError {
  #[error("validation: {field}: {reason}")]
  Validation { field: String, reason: String },

  #[error("store: {0}")]
  Store(#[from] StoreError),
}

impl EngineError {
  pub fn validation(field: &str, reason: &str) -> Self {
    Self::Validation {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }
}

/// Persistence failures reported by a store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("unavailable: {0}")]
  Unavailable(String),

  #[error("not found: {0}")]
  NotFound(uuid::Uuid),

  #[error("db: {0}")]
  Db(#[from] sqlx::Error),
}

/// Summarizer call failures. Never propagated to the ingesting caller; the
/// incident keeps its rule-generated description.
#[derive(Debug, Error)]
pub enum EnrichmentError {
  #[error("request: {0}")]
  Request(#[from] reqwest::Error),

  #[error("unavailable: {0}")]
  Unavailable(String),
}
