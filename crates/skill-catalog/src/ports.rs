//! Async ports to the services the profiling engine consumes.
//!
//! - `CandidateIndex`: similarity lookup of nearby catalog entries
//! - `Classifier`: judges one work item against its candidates
//!
//! Both are shared by every concurrent batch and item task, so
//! implementations must be reentrant and must not require external locking.
//! In-memory fakes live in the `fakes` module.

use async_trait::async_trait;

use crate::error::{CatalogUnavailable, ClassifyError};
use crate::model::{CatalogEntry, ClassificationResult, WorkItem};

/// Result type for classification calls
pub type ClassifyResult<T> = std::result::Result<T, ClassifyError>;

/// Black-box similarity search over the skill catalog.
#[async_trait]
pub trait CandidateIndex: Send + Sync {
    /// Return up to `top_k` catalog entries closest to `item`, best first.
    async fn lookup(
        &self,
        item: &WorkItem,
        top_k: usize,
    ) -> std::result::Result<Vec<CatalogEntry>, CatalogUnavailable>;
}

/// The external, fallible classification service (e.g. an LLM call).
///
/// Implementations that receive free-form text should turn it into a
/// [`ClassificationResult`] with [`crate::schema::parse_classification`] so
/// that malformed output surfaces as [`ClassifyError::Validation`] rather
/// than a coerced value.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(
        &self,
        item: &WorkItem,
        candidates: &[CatalogEntry],
        confidence_threshold: f64,
    ) -> ClassifyResult<ClassificationResult>;
}
