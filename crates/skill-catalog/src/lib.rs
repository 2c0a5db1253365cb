//! Skill-Catalog: the collaborator boundary of the skill profiler
//!
//! This crate owns everything the profiling engine consumes but does not
//! implement itself: the catalog of known skills, the work items extracted
//! upstream, and the async ports through which the engine reaches the
//! candidate-lookup index and the classification service.
//!
//! ## Layer 0 - Boundary model
//!
//! Focus: strict typing at the seams. Anything a classifier returns is
//! checked against [`schema`] before the engine trusts it.
//!
//! ## Key Components
//!
//! - `CatalogEntry` / `CatalogStats`: known skills and their per-category
//!   and per-partition totals
//! - `WorkItem`: one extracted code fragment
//! - `Classifier` / `CandidateIndex`: the consumed services
//! - `fakes`: deterministic in-memory implementations for tests

mod error;
pub mod fakes;
mod model;
pub mod ports;
pub mod schema;

pub use error::{CatalogUnavailable, ClassifyError, ModelError};
pub use model::{
    CatalogEntry, CatalogStats, ClassificationResult, SkillJudgement, SkillKey, SkillLevel,
    SourceLocation, SuggestionDraft, WorkItem,
};
pub use ports::{CandidateIndex, Classifier, ClassifyResult};
pub use schema::parse_classification;
