//! Explicit run context shared by coordinator and workers.

use std::fmt;
use std::sync::Arc;

use skill_catalog::{CandidateIndex, Classifier};

use crate::config::{ConfigError, ProfilerConfig};
use crate::leveling::LevelTable;
use crate::sink::ResultSink;

/// Validated configuration plus handles to the consumed services.
///
/// Built once per host and passed by reference; the engine keeps no
/// process-wide state.
#[derive(Clone)]
pub struct ProfilerContext {
    pub config: ProfilerConfig,
    pub classifier: Arc<dyn Classifier>,
    pub index: Arc<dyn CandidateIndex>,
    pub sink: Option<Arc<dyn ResultSink>>,
    pub levels: LevelTable,
}

impl ProfilerContext {
    /// Fails with the first configuration error.
    pub fn new(
        config: ProfilerConfig,
        classifier: Arc<dyn Classifier>,
        index: Arc<dyn CandidateIndex>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            classifier,
            index,
            sink: None,
            levels: LevelTable::standard(),
        })
    }

    pub fn with_sink(mut self, sink: Arc<dyn ResultSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_level_table(mut self, levels: LevelTable) -> Self {
        self.levels = levels;
        self
    }
}

impl fmt::Debug for ProfilerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfilerContext")
            .field("config", &self.config)
            .field("has_sink", &self.sink.is_some())
            .field("levels", &self.levels.max_level())
            .finish()
    }
}
