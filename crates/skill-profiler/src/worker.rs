//! Per-batch classification with per-item failure isolation.
//!
//! Every item of a batch runs as its own task: candidate lookup, then one
//! classifier call, under the configured per-item timeout. A failing,
//! timed-out or panicking item is recorded as failed for the round and
//! never disturbs its siblings. Only a `CatalogUnavailable` from the index
//! escapes, aborting the remaining item tasks.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use skill_catalog::{CatalogEntry, ClassificationResult, SkillKey, WorkItem};
use tokio::task::JoinSet;
use tracing::{debug, instrument, warn};

use crate::batcher::Batch;
use crate::context::ProfilerContext;
use crate::error::{ItemError, ProfilerError, Result};
use crate::metrics::RunMetrics;
use crate::outcome::{
    BatchOutcome, BatchStatus, ClassificationMatch, ItemFailure, MissingSkillSuggestion,
};

/// Characters of the payload kept as a suggestion's code excerpt.
const EXCERPT_CHARS: usize = 500;

/// Matches and suggestions extracted from one schema-valid response.
#[derive(Debug, Default)]
struct ItemClassified {
    matches: Vec<ClassificationMatch>,
    suggestions: Vec<MissingSkillSuggestion>,
}

type ItemResult = std::result::Result<ItemClassified, ItemError>;

/// Runs the classifier over every item of a batch concurrently.
#[derive(Debug, Clone)]
pub struct BatchWorker {
    ctx: Arc<ProfilerContext>,
    metrics: Arc<RunMetrics>,
}

impl BatchWorker {
    pub fn new(ctx: Arc<ProfilerContext>, metrics: Arc<RunMetrics>) -> Self {
        Self { ctx, metrics }
    }

    /// Classify every item of `batch` and report the round.
    ///
    /// The returned outcome has `retry_round = 0`; the coordinator tags
    /// retries. Items are reported in input order.
    #[instrument(skip(self, batch), fields(batch_id = batch.batch_id, items = batch.items.len()))]
    pub async fn process(&self, batch: Batch) -> Result<BatchOutcome> {
        let Batch { batch_id, items } = batch;

        let mut join_set = JoinSet::new();
        for (idx, item) in items.iter().cloned().enumerate() {
            let ctx = Arc::clone(&self.ctx);
            join_set.spawn(async move {
                let guarded = AssertUnwindSafe(classify_item(&ctx, &item)).catch_unwind();
                let result = match guarded.await {
                    Ok(result) => result,
                    Err(panic) => Err(ItemError::Transient(format!(
                        "classifier panicked: {}",
                        panic_message(panic.as_ref())
                    ))),
                };
                (idx, result)
            });
        }

        let mut slots: Vec<Option<ItemResult>> = (0..items.len()).map(|_| None).collect();
        while let Some(joined) = join_set.join_next().await {
            let (idx, result) = joined.map_err(|e| ProfilerError::TaskJoin {
                detail: format!("item task join error in batch {batch_id}: {e}"),
            })?;
            if let Err(ItemError::CatalogUnavailable(reason)) = &result {
                warn!(
                    batch_id,
                    item_id = %items[idx].id,
                    %reason,
                    "catalog unavailable, abandoning batch"
                );
                join_set.abort_all();
                return Err(ProfilerError::CatalogUnavailable {
                    batch_id,
                    reason: reason.clone(),
                });
            }
            slots[idx] = Some(result);
        }

        let mut outcome = BatchOutcome {
            batch_id,
            retry_round: 0,
            matches: Vec::new(),
            suggestions: Vec::new(),
            succeeded_items: Vec::new(),
            failed_items: Vec::new(),
            failures: Vec::new(),
            success_rate: 0.0,
            status: BatchStatus::Failed,
        };

        for (item, slot) in items.into_iter().zip(slots) {
            let result = slot.ok_or_else(|| ProfilerError::TaskJoin {
                detail: format!("missing result for item '{}' in batch {batch_id}", item.id),
            })?;
            match result {
                Ok(classified) => {
                    self.metrics.inc_items_classified();
                    outcome.matches.extend(classified.matches);
                    outcome.suggestions.extend(classified.suggestions);
                    outcome.succeeded_items.push(item.id);
                }
                Err(error) => {
                    self.metrics.inc_items_failed();
                    if matches!(error, ItemError::Timeout { .. }) {
                        self.metrics.inc_item_timeouts();
                    }
                    warn!(batch_id, item_id = %item.id, %error, "item failed");
                    outcome.failures.push(ItemFailure {
                        item_id: item.id.clone(),
                        error,
                    });
                    outcome.failed_items.push(item);
                }
            }
        }

        let total = outcome.item_count();
        outcome.success_rate = if total == 0 {
            1.0
        } else {
            outcome.succeeded_items.len() as f64 / total as f64
        };
        let cfg = &self.ctx.config;
        outcome.status = BatchStatus::from_rate(
            outcome.success_rate,
            cfg.success_rate_threshold,
            cfg.partial_success_threshold,
        );

        debug!(
            batch_id,
            succeeded = outcome.succeeded_items.len(),
            failed = outcome.failed_items.len(),
            matches = outcome.matches.len(),
            success_rate = outcome.success_rate,
            "batch processed"
        );
        Ok(outcome)
    }
}

async fn classify_item(ctx: &ProfilerContext, item: &WorkItem) -> ItemResult {
    let cfg = &ctx.config;
    let attempt = async {
        let candidates = ctx
            .index
            .lookup(item, cfg.top_k_candidates)
            .await
            .map_err(|e| ItemError::CatalogUnavailable(e.reason))?;
        let response = ctx
            .classifier
            .classify(item, &candidates, cfg.confidence_threshold)
            .await?;
        response.validate()?;
        Ok::<_, ItemError>(enrich(
            item,
            &candidates,
            response,
            cfg.confidence_threshold,
        ))
    };

    match tokio::time::timeout(cfg.item_timeout(), attempt).await {
        Ok(result) => result,
        Err(_) => Err(ItemError::Timeout {
            after_ms: cfg.item_timeout_ms,
        }),
    }
}

/// Drop low-confidence matches and attach catalog weight and partitions.
fn enrich(
    item: &WorkItem,
    candidates: &[CatalogEntry],
    response: ClassificationResult,
    threshold: f64,
) -> ItemClassified {
    let by_key: HashMap<SkillKey, &CatalogEntry> =
        candidates.iter().map(|c| (c.key(), c)).collect();

    let matches = response
        .matches
        .into_iter()
        .filter(|j| j.confidence >= threshold)
        .map(|j| {
            let entry = by_key.get(&j.key());
            if entry.is_none() {
                debug!(item_id = %item.id, skill = %j.key(), "match outside candidate list");
            }
            ClassificationMatch {
                item_id: item.id.clone(),
                base_weight: entry.map_or(0, |e| e.base_weight),
                partition_tags: entry.map(|e| e.partition_tags.clone()).unwrap_or_default(),
                skill_name: j.skill_name,
                level: j.level,
                category: j.category,
                subcategory: j.subcategory,
                confidence: j.confidence,
                rationale: j.rationale,
            }
        })
        .collect();

    let excerpt: String = item.payload.chars().take(EXCERPT_CHARS).collect();
    let suggestions = response
        .suggestions
        .into_iter()
        .map(|s| MissingSkillSuggestion {
            suggested_name: s.suggested_name,
            suggested_level: s.suggested_level,
            suggested_category: s.suggested_category,
            suggested_subcategory: s.suggested_subcategory,
            description: s.description,
            evidence: s.evidence,
            source: item.source.clone(),
            code_excerpt: excerpt.clone(),
        })
        .collect();

    ItemClassified {
        matches,
        suggestions,
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
