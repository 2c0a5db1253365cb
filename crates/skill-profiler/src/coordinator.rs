//! Round-based dispatch with bounded retries.
//!
//! Round 0 partitions all items and dispatches every batch concurrently
//! (at most `max_workers` batch tasks in flight). Each round is a task
//! group that fully joins before any batch is evaluated. A batch whose
//! cumulative success rate is below `success_rate_threshold` is re-dispatched
//! in the next round with only its failed items, under the same `batch_id`,
//! until it passes or `max_retry_rounds` is exhausted.
//!
//! Per batch: `Dispatched -> Evaluated -> (Done | Retrying)`, and
//! `Retrying -> Dispatched` for the next round.
//!
//! A `CatalogUnavailable` anywhere aborts all in-flight batch tasks and the
//! run returns the error alone. Nothing from the aborted round is
//! persisted.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skill_catalog::{CatalogStats, WorkItem};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, Instrument};

use crate::aggregate::{aggregate, dedup_suggestions, AggregatedProfile, AggregationPolicy};
use crate::batcher::{partition, partition_digest, Batch, BatchStats};
use crate::config::ProfilerConfig;
use crate::context::ProfilerContext;
use crate::error::{ProfilerError, Result};
use crate::leveling::LevelTable;
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::obs;
use crate::outcome::{BatchOutcome, BatchStatus, FailedItemDiagnostic, MissingSkillSuggestion};
use crate::suggestions::NoiseFilter;
use crate::worker::BatchWorker;

/// Lifecycle phase of one original batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPhase {
    Dispatched,
    Evaluated,
    Retrying,
    Done,
}

/// Status table row for one original batch.
#[derive(Debug, Clone)]
pub struct BatchLedgerEntry {
    pub phase: BatchPhase,
    /// Round currently dispatched or last evaluated
    pub round: u32,
    pub original_size: usize,
    /// All rounds merged so far; `None` until round 0 is evaluated
    pub merged: Option<BatchOutcome>,
    /// Outcome reported by the batch task for the current round
    pub pending: Option<BatchOutcome>,
}

type Ledger = Arc<Mutex<BTreeMap<u32, BatchLedgerEntry>>>;

/// Everything a completed run produced, minus the profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub partition_digest: String,
    pub batch_stats: BatchStats,
    /// Final merged outcome per original batch, ordered by `batch_id`
    pub outcomes: Vec<BatchOutcome>,
    pub diagnostics: Vec<FailedItemDiagnostic>,
    pub metrics: MetricsSnapshot,
}

impl RunReport {
    pub fn statuses(&self) -> Vec<(u32, BatchStatus)> {
        self.outcomes
            .iter()
            .map(|o| (o.batch_id, o.status))
            .collect()
    }

    /// Items that ended with a schema-valid response, with or without matches.
    pub fn succeeded_item_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.succeeded_items.len()).sum()
    }

    pub fn failed_item_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.failed_items.len()).sum()
    }

    pub fn duration_ms(&self) -> u64 {
        (self.finished_at - self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Aggregate the outcomes into a profile.
    pub fn profile(
        &self,
        catalog: &CatalogStats,
        policy: &AggregationPolicy,
        levels: &LevelTable,
    ) -> AggregatedProfile {
        aggregate(&self.outcomes, catalog, policy, levels)
    }

    /// Deduplicated suggestions with noise removed, for catalog curation.
    pub fn advisory_suggestions(&self, filter: &NoiseFilter) -> Vec<MissingSkillSuggestion> {
        let unique = dedup_suggestions(self.outcomes.iter().flat_map(|o| o.suggestions.iter()));
        let (kept, dropped) = filter.apply(unique);
        debug!(kept = kept.len(), dropped = dropped.len(), "advisory suggestions filtered");
        kept
    }
}

/// Drives batches through classification rounds.
#[derive(Debug, Clone)]
pub struct Coordinator {
    ctx: Arc<ProfilerContext>,
}

impl Coordinator {
    pub fn new(ctx: ProfilerContext) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn context(&self) -> &ProfilerContext {
        &self.ctx
    }

    /// Classify `items` and return the final outcome of every batch.
    ///
    /// Fails with `Configuration` or `DuplicateItemId` before any dispatch,
    /// or with `CatalogUnavailable` / `TaskJoin` after aborting in-flight
    /// work.
    pub async fn run(&self, items: Vec<WorkItem>) -> Result<RunReport> {
        self.ctx.config.validate()?;
        ensure_unique_ids(&items)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let span = obs::run_span(&run_id);
        self.run_inner(run_id, items).instrument(span).await
    }

    /// Run, then aggregate with the context's policy and level table.
    pub async fn profile(
        &self,
        items: Vec<WorkItem>,
        catalog: &CatalogStats,
    ) -> Result<(RunReport, AggregatedProfile)> {
        let report = self.run(items).await?;
        let profile = report.profile(
            catalog,
            &self.ctx.config.aggregation_policy(),
            &self.ctx.levels,
        );
        Ok((report, profile))
    }

    async fn run_inner(&self, run_id: String, items: Vec<WorkItem>) -> Result<RunReport> {
        let started_at = Utc::now();
        let cfg = &self.ctx.config;
        let metrics = Arc::new(RunMetrics::new());
        let worker = BatchWorker::new(Arc::clone(&self.ctx), Arc::clone(&metrics));

        let total_items = items.len();
        let batches = partition(items, cfg.max_workers, cfg.target_batch_size)?;
        let digest = partition_digest(&batches);
        let batch_stats = BatchStats::of(&batches);
        debug!(
            batches = batch_stats.total_batches,
            min_size = batch_stats.min_size,
            max_size = batch_stats.max_size,
            std_dev = batch_stats.std_dev,
            digest = %digest,
            "items partitioned"
        );
        obs::emit_run_started(&run_id, total_items, batches.len());

        let ledger: Ledger = Arc::new(Mutex::new(
            batches
                .iter()
                .map(|b| {
                    let entry = BatchLedgerEntry {
                        phase: BatchPhase::Dispatched,
                        round: 0,
                        original_size: b.len(),
                        merged: None,
                        pending: None,
                    };
                    (b.batch_id, entry)
                })
                .collect(),
        ));

        let mut to_dispatch = batches;
        let mut round = 0u32;
        while !to_dispatch.is_empty() {
            let round_items: usize = to_dispatch.iter().map(Batch::len).sum();
            obs::emit_round_started(&run_id, round, to_dispatch.len(), round_items);

            if let Err(err) = self
                .dispatch_round(&worker, &metrics, &ledger, round, to_dispatch)
                .await
            {
                obs::emit_run_aborted(&run_id, &err);
                metrics.flush(&run_id);
                return Err(err);
            }

            let round_outcomes = take_pending(&ledger).await;
            self.persist_round(&metrics, &round_outcomes).await;
            to_dispatch = self.evaluate_round(&ledger, round, round_outcomes).await;
            round += 1;
        }

        let entries = std::mem::take(&mut *ledger.lock().await);
        let outcomes: Vec<BatchOutcome> = entries
            .into_values()
            .filter_map(|entry| entry.merged)
            .collect();
        let diagnostics = diagnostics_for(&outcomes);

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            partition_digest: digest,
            batch_stats,
            outcomes,
            diagnostics,
            metrics: metrics.snapshot(),
        };

        let statuses: Vec<BatchStatus> = report.outcomes.iter().map(|o| o.status).collect();
        obs::emit_run_finished(
            &report.run_id,
            report.duration_ms(),
            &statuses,
            report.failed_item_count(),
        );
        metrics.flush(&report.run_id);
        Ok(report)
    }

    /// Run one round as a task group and join it completely.
    #[instrument(skip_all, fields(round = round, batches = batches.len()))]
    async fn dispatch_round(
        &self,
        worker: &BatchWorker,
        metrics: &Arc<RunMetrics>,
        ledger: &Ledger,
        round: u32,
        batches: Vec<Batch>,
    ) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.ctx.config.max_workers));
        let mut join_set = JoinSet::new();

        for batch in batches {
            {
                let mut table = ledger.lock().await;
                if let Some(entry) = table.get_mut(&batch.batch_id) {
                    entry.phase = BatchPhase::Dispatched;
                    entry.round = round;
                }
            }
            metrics.inc_batches_dispatched();
            if round > 0 {
                metrics.inc_retries_dispatched();
            }

            let worker = worker.clone();
            let ledger = Arc::clone(ledger);
            let permits = Arc::clone(&permits);
            join_set.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|e| ProfilerError::TaskJoin {
                        detail: format!("dispatch semaphore closed: {e}"),
                    })?;
                let batch_id = batch.batch_id;
                let mut outcome = worker.process(batch).await?;
                outcome.retry_round = round;

                let mut table = ledger.lock().await;
                if let Some(entry) = table.get_mut(&batch_id) {
                    entry.pending = Some(outcome);
                }
                Ok::<(), ProfilerError>(())
            });
        }

        while let Some(joined) = join_set.join_next().await {
            let result = joined.map_err(|e| ProfilerError::TaskJoin {
                detail: format!("batch task join error in round {round}: {e}"),
            });
            if let Err(err) = result.and_then(|r| r) {
                join_set.abort_all();
                return Err(err);
            }
        }
        Ok(())
    }

    async fn persist_round(&self, metrics: &RunMetrics, outcomes: &[BatchOutcome]) {
        let Some(sink) = &self.ctx.sink else {
            return;
        };
        for outcome in outcomes {
            if let Err(err) = sink.persist(outcome.batch_id, outcome).await {
                metrics.inc_sink_failures();
                obs::emit_sink_error(outcome.batch_id, outcome.retry_round, &err);
            }
        }
    }

    /// Merge the round into each batch and decide which batches retry.
    async fn evaluate_round(
        &self,
        ledger: &Ledger,
        round: u32,
        outcomes: Vec<BatchOutcome>,
    ) -> Vec<Batch> {
        let cfg = &self.ctx.config;
        let mut table = ledger.lock().await;
        let mut retries = Vec::new();

        for outcome in outcomes {
            let batch_id = outcome.batch_id;
            let Some(entry) = table.get_mut(&batch_id) else {
                continue;
            };
            let merged = match entry.merged.take() {
                None => outcome,
                Some(previous) => merge_round(previous, outcome),
            };
            let merged = finalize_rate(merged, entry.original_size, cfg);
            entry.phase = BatchPhase::Evaluated;

            let retry = merged.success_rate < cfg.success_rate_threshold
                && round < cfg.max_retry_rounds
                && !merged.failed_items.is_empty();
            obs::emit_batch_evaluated(batch_id, round, merged.success_rate, retry);

            if retry {
                entry.phase = BatchPhase::Retrying;
                retries.push(Batch::new(batch_id, merged.failed_items.clone()));
            } else {
                entry.phase = BatchPhase::Done;
            }
            entry.merged = Some(merged);
        }

        if !retries.is_empty() {
            info!(round, retrying = retries.len(), "scheduling retry round");
        }
        retries
    }
}

async fn take_pending(ledger: &Ledger) -> Vec<BatchOutcome> {
    let mut table = ledger.lock().await;
    table
        .values_mut()
        .filter_map(|entry| entry.pending.take())
        .collect()
}

/// Fold a retry round into the accumulated outcome of its batch.
fn merge_round(mut merged: BatchOutcome, round: BatchOutcome) -> BatchOutcome {
    merged.retry_round = round.retry_round;
    merged.matches.extend(round.matches);
    merged.suggestions.extend(round.suggestions);
    merged.succeeded_items.extend(round.succeeded_items);
    merged.failed_items = round.failed_items;
    merged.failures = round.failures;
    merged
}

/// Recompute rate and status over the original batch size.
fn finalize_rate(
    mut merged: BatchOutcome,
    original_size: usize,
    cfg: &ProfilerConfig,
) -> BatchOutcome {
    merged.success_rate = if original_size == 0 {
        1.0
    } else {
        (original_size - merged.failed_items.len().min(original_size)) as f64
            / original_size as f64
    };
    merged.status = BatchStatus::from_rate(
        merged.success_rate,
        cfg.success_rate_threshold,
        cfg.partial_success_threshold,
    );
    merged
}

fn diagnostics_for(outcomes: &[BatchOutcome]) -> Vec<FailedItemDiagnostic> {
    outcomes
        .iter()
        .flat_map(|outcome| {
            outcome.failed_items.iter().filter_map(move |item| {
                outcome
                    .last_error_for(&item.id)
                    .map(|error| FailedItemDiagnostic {
                        batch_id: outcome.batch_id,
                        item: item.clone(),
                        last_error: error.clone(),
                        last_round: outcome.retry_round,
                    })
            })
        })
        .collect()
}


/// Outcomes and retries track items by id, so ids must be unique per run.
fn ensure_unique_ids(items: &[WorkItem]) -> Result<()> {
    let mut seen = HashSet::with_capacity(items.len());
    match items.iter().find(|item| !seen.insert(item.id.as_str())) {
        Some(dup) => Err(ProfilerError::DuplicateItemId {
            item_id: dup.id.clone(),
        }),
        None => Ok(()),
    }
}
