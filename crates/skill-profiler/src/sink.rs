//! Optional persistence of round outcomes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::outcome::BatchOutcome;

/// Receives every completed round of every batch.
///
/// Called once per batch per round, after the whole round has joined.
/// Errors are logged by the coordinator and never fail the run.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, batch_id: u32, outcome: &BatchOutcome) -> Result<(), SinkError>;
}

/// In-memory sink recording `(batch_id, retry_round)` pairs.
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    persisted: Mutex<Vec<(u32, u32)>>,
    failing: AtomicBool,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `persist` call fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn persisted(&self) -> Vec<(u32, u32)> {
        self.persisted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ResultSink for MemoryResultSink {
    async fn persist(&self, batch_id: u32, outcome: &BatchOutcome) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError(format!("refusing batch {batch_id}")));
        }
        self.persisted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((batch_id, outcome.retry_round));
        Ok(())
    }
}
