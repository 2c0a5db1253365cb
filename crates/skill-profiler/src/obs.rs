//! Structured observability hooks for the profiling run lifecycle.
//!
//! This module provides:
//! - A run-scoped tracing span, attached to the run future
//! - Emission functions for lifecycle events: start, round, batch
//!   evaluation, finish, abort and sink errors
//!
//! Events are emitted at `info!` level. Nothing here installs a subscriber:
//! hosts call [`crate::telemetry::init_tracing`] with an explicit format, or
//! [`crate::telemetry::init_tracing_from_env`], which is the only place
//! `SKILLPROF_LOG_FORMAT` is read. `SKILLPROF_LOG` filters in both cases.

use tracing::{info, warn, Span};

use crate::outcome::BatchStatus;

/// Span tagged with the run id.
///
/// ```ignore
/// use tracing::Instrument;
/// coordinator_run(items).instrument(run_span(&run_id)).await
/// ```
pub fn run_span(run_id: &str) -> Span {
    tracing::info_span!("skillprof.run", run_id = %run_id)
}

/// Emit event: run started with the size of its partition.
pub fn emit_run_started(run_id: &str, total_items: usize, total_batches: usize) {
    info!(
        event = "run.started",
        run_id = %run_id,
        total_items = total_items,
        total_batches = total_batches,
    );
}

/// Emit event: a dispatch round is starting.
pub fn emit_round_started(run_id: &str, round: u32, batches: usize, items: usize) {
    info!(
        event = "round.started",
        run_id = %run_id,
        round = round,
        batches = batches,
        items = items,
    );
}

/// Emit event: a batch was evaluated after a round.
pub fn emit_batch_evaluated(batch_id: u32, round: u32, success_rate: f64, retrying: bool) {
    info!(
        event = "batch.evaluated",
        batch_id = batch_id,
        round = round,
        success_rate = success_rate,
        retrying = retrying,
    );
}

/// Emit event: run finished with per-status batch counts.
pub fn emit_run_finished(
    run_id: &str,
    duration_ms: u64,
    statuses: &[BatchStatus],
    failed_items: usize,
) {
    let count = |wanted: BatchStatus| statuses.iter().filter(|s| **s == wanted).count();
    info!(
        event = "run.finished",
        run_id = %run_id,
        duration_ms = duration_ms,
        success = count(BatchStatus::Success),
        partial_success = count(BatchStatus::PartialSuccess),
        failed = count(BatchStatus::Failed),
        failed_items = failed_items,
    );
}

/// Emit event: run aborted by a fatal error (warning level).
pub fn emit_run_aborted(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.aborted", run_id = %run_id, error = %error);
}

/// Emit event: a round outcome could not be persisted (warning level).
pub fn emit_sink_error(batch_id: u32, round: u32, error: &dyn std::fmt::Display) {
    warn!(
        event = "sink.error",
        batch_id = batch_id,
        round = round,
        error = %error,
    );
}
