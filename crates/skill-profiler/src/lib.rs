//! Skill Profiler: batch classification engine
//!
//! Classifies extracted code fragments against a skill catalog through a
//! fallible classifier, under a concurrency cap and with bounded retries,
//! then folds the results into a deduplicated, leveled skill profile.
//!
//! ## Layer 1 - Engine
//!
//! Data flow:
//!
//! ```text
//! items -> batcher::partition -> Coordinator (rounds) -> BatchWorker -> Classifier
//!       -> BatchOutcome per batch -> aggregate -> AggregatedProfile (+ LevelInfo)
//! ```
//!
//! ## Key Components
//!
//! - `batcher`: balanced, deterministic partitioning
//! - `worker`: per-item isolated classification of one batch
//! - `coordinator`: round loop, retry policy, run report
//! - `aggregate`: deduplication, coverage, experience
//! - `leveling`: experience to level mapping
//! - `suggestions`: noise filter for advisory catalog additions
//! - `obs` / `metrics` / `telemetry`: tracing events, run counters, subscriber setup

pub mod aggregate;
pub mod batcher;
pub mod config;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod leveling;
pub mod metrics;
pub mod obs;
pub mod outcome;
pub mod sink;
pub mod suggestions;
pub mod telemetry;
pub mod worker;

pub use aggregate::{
    aggregate, canonicalize, merge_canonical, total_experience, AggregatedProfile,
    AggregationPolicy, CanonicalSkill, CategoryStats, Coverage, PartitionProfile,
};
pub use batcher::{partition, partition_digest, Batch, BatchStats};
pub use config::{ConfigError, ProfilerConfig};
pub use context::ProfilerContext;
pub use coordinator::{BatchPhase, Coordinator, RunReport};
pub use error::{ItemError, ProfilerError, Result, SinkError};
pub use leveling::{LevelInfo, LevelTable, LevelTier};
pub use metrics::{MetricsSnapshot, RunMetrics};
pub use outcome::{
    BatchOutcome, BatchStatus, ClassificationMatch, FailedItemDiagnostic, ItemFailure,
    MissingSkillSuggestion,
};
pub use sink::{MemoryResultSink, ResultSink};
pub use suggestions::{NoiseFilter, NoiseReason};
pub use telemetry::{init_tracing, init_tracing_from_env, LogFormat};
pub use worker::BatchWorker;
