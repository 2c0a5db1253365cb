//! Error taxonomy of the profiling engine.

use serde::{Deserialize, Serialize};
use skill_catalog::ClassifyError;
use thiserror::Error;

use crate::config::ConfigError;

/// Why a single work item failed in one round.
///
/// Everything except [`ItemError::CatalogUnavailable`] is recovered locally:
/// the item is recorded as failed and becomes eligible for the next retry
/// round.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ItemError {
    #[error("transient classifier failure: {0}")]
    Transient(String),

    #[error("invalid classifier response: {0}")]
    Validation(String),

    #[error("classification timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("skill catalog unavailable: {0}")]
    CatalogUnavailable(String),
}

impl ItemError {
    /// True when the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ItemError::CatalogUnavailable(_))
    }
}

impl From<ClassifyError> for ItemError {
    fn from(err: ClassifyError) -> Self {
        match err {
            ClassifyError::Transient(detail) => ItemError::Transient(detail),
            ClassifyError::Validation(detail) => ItemError::Validation(detail),
        }
    }
}

/// Run-level errors. These are the only errors a caller of the engine sees,
/// and none of them comes with a profile.
#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("invalid configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error("skill catalog unavailable while processing batch {batch_id}: {reason}")]
    CatalogUnavailable { batch_id: u32, reason: String },

    #[error("batch task failed: {detail}")]
    TaskJoin { detail: String },

    #[error("duplicate work item id '{item_id}'")]
    DuplicateItemId { item_id: String },
}

/// Failure to persist a round outcome. Logged, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("result sink error: {0}")]
pub struct SinkError(pub String);

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, ProfilerError>;
