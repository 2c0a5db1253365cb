//! Balanced batch partitioning.
//!
//! [`partition`] splits an ordered list of work items into near-equal
//! batches. The number of batches is `min(ceil(n / target_batch_size),
//! max_workers)`; the first `n % num_batches` batches receive one extra
//! item. The result depends only on the input order, so repeated runs
//! produce identical partitions (see [`partition_digest`]).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use skill_catalog::WorkItem;

use crate::config::ConfigError;

/// An ordered group of work items dispatched together.
///
/// Retry rounds re-create a smaller batch under the same `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: u32,
    pub items: Vec<WorkItem>,
}

impl Batch {
    pub fn new(batch_id: u32, items: Vec<WorkItem>) -> Self {
        Self { batch_id, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// SHA-256 over the batch id and the ordered item ids.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        feed_batch(&mut hasher, self);
        hex::encode(hasher.finalize())
    }
}

fn feed_batch(hasher: &mut Sha256, batch: &Batch) {
    hasher.update(batch.batch_id.to_be_bytes());
    hasher.update((batch.items.len() as u64).to_be_bytes());
    for item in &batch.items {
        hasher.update((item.id.len() as u64).to_be_bytes());
        hasher.update(item.id.as_bytes());
    }
}

/// Partition `items` into balanced batches.
///
/// Empty input yields no batches. Fails only when `max_workers` or
/// `target_batch_size` is zero.
pub fn partition(
    items: Vec<WorkItem>,
    max_workers: usize,
    target_batch_size: usize,
) -> Result<Vec<Batch>, ConfigError> {
    if max_workers < 1 {
        return Err(ConfigError::NonPositive {
            field: "max_workers",
        });
    }
    if target_batch_size < 1 {
        return Err(ConfigError::NonPositive {
            field: "target_batch_size",
        });
    }
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let total = items.len();
    let num_batches = total.div_ceil(target_batch_size).min(max_workers);
    let base_size = total / num_batches;
    let remainder = total % num_batches;

    let mut batches = Vec::with_capacity(num_batches);
    let mut rest = items.into_iter();
    for idx in 0..num_batches {
        let size = if idx < remainder {
            base_size + 1
        } else {
            base_size
        };
        let chunk: Vec<WorkItem> = rest.by_ref().take(size).collect();
        batches.push(Batch::new(idx as u32, chunk));
    }

    Ok(batches)
}

/// Digest of a whole partition: equal digests mean equal batch ids, sizes
/// and item order.
pub fn partition_digest(batches: &[Batch]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((batches.len() as u64).to_be_bytes());
    for batch in batches {
        feed_batch(&mut hasher, batch);
    }
    hex::encode(hasher.finalize())
}

/// Size distribution of a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_batches: usize,
    pub total_items: usize,
    pub min_size: usize,
    pub max_size: usize,
    pub mean_size: f64,
    /// Population standard deviation of the batch sizes
    pub std_dev: f64,
    pub is_balanced: bool,
}

impl BatchStats {
    pub fn of(batches: &[Batch]) -> Self {
        let sizes: Vec<usize> = batches.iter().map(Batch::len).collect();
        let total_items: usize = sizes.iter().sum();
        let min_size = sizes.iter().copied().min().unwrap_or(0);
        let max_size = sizes.iter().copied().max().unwrap_or(0);

        let (mean_size, std_dev) = if sizes.is_empty() {
            (0.0, 0.0)
        } else {
            let n = sizes.len() as f64;
            let mean = total_items as f64 / n;
            let variance = sizes
                .iter()
                .map(|&s| (s as f64 - mean).powi(2))
                .sum::<f64>()
                / n;
            (mean, variance.sqrt())
        };

        Self {
            total_batches: batches.len(),
            total_items,
            min_size,
            max_size,
            mean_size,
            std_dev,
            is_balanced: max_size - min_size <= 1,
        }
    }
}
