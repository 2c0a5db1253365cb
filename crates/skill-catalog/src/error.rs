//! Error types for the catalog boundary

use thiserror::Error;

/// Failure of a single classification call.
///
/// Both variants are recoverable: the engine records the item as failed for
/// the current round and may resubmit it in a later one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    /// Timeout, transport failure, rate limiting
    #[error("transient classifier failure: {0}")]
    Transient(String),

    /// Response could not be parsed or violated the response schema
    #[error("classifier response failed validation: {0}")]
    Validation(String),
}

/// The candidate-lookup index cannot serve requests.
///
/// Non-retryable; a profiling run that sees this aborts as a whole.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("skill catalog unavailable: {reason}")]
pub struct CatalogUnavailable {
    pub reason: String,
}

impl CatalogUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Errors raised while building catalog model values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("unknown skill level: {0}")]
    UnknownLevel(String),
}
