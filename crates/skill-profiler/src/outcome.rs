//! Per-item and per-batch results of classification rounds.

use serde::{Deserialize, Serialize};
use skill_catalog::{SkillKey, SkillLevel, SourceLocation, WorkItem};

use crate::error::ItemError;

/// A retained classifier match, enriched with catalog data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMatch {
    /// Item that produced the match
    pub item_id: String,
    pub skill_name: String,
    pub level: SkillLevel,
    pub category: String,
    pub subcategory: String,
    pub confidence: f64,
    pub rationale: String,
    /// Looked up from the candidate entry; 0 when the classifier named a
    /// skill that was not among the candidates.
    pub base_weight: u32,
    pub partition_tags: Vec<String>,
}

impl ClassificationMatch {
    pub fn key(&self) -> SkillKey {
        SkillKey::new(self.skill_name.clone(), self.level)
    }
}

/// Advisory proposal for a catalog addition. Never contributes to
/// experience or coverage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingSkillSuggestion {
    pub suggested_name: String,
    pub suggested_level: SkillLevel,
    pub suggested_category: String,
    pub suggested_subcategory: String,
    pub description: String,
    pub evidence: String,
    pub source: SourceLocation,
    pub code_excerpt: String,
}

/// Informational status of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Success,
    PartialSuccess,
    Failed,
}

impl BatchStatus {
    pub fn from_rate(rate: f64, success_threshold: f64, partial_threshold: f64) -> Self {
        if rate >= success_threshold {
            BatchStatus::Success
        } else if rate >= partial_threshold {
            BatchStatus::PartialSuccess
        } else {
            BatchStatus::Failed
        }
    }
}

/// One item that failed in a round and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub item_id: String,
    pub error: ItemError,
}

/// Result of one batch: a single round as returned by the worker, or the
/// merged result of all rounds as returned by the coordinator.
///
/// `succeeded_items.len() + failed_items.len()` equals the number of items
/// the outcome covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub batch_id: u32,
    pub retry_round: u32,
    pub matches: Vec<ClassificationMatch>,
    pub suggestions: Vec<MissingSkillSuggestion>,
    /// Ids of items that got a schema-valid response, possibly with no match
    pub succeeded_items: Vec<String>,
    pub failed_items: Vec<WorkItem>,
    /// Parallel to `failed_items`
    pub failures: Vec<ItemFailure>,
    pub success_rate: f64,
    pub status: BatchStatus,
}

impl BatchOutcome {
    pub fn item_count(&self) -> usize {
        self.succeeded_items.len() + self.failed_items.len()
    }

    pub fn last_error_for(&self, item_id: &str) -> Option<&ItemError> {
        self.failures
            .iter()
            .find(|f| f.item_id == item_id)
            .map(|f| &f.error)
    }
}

/// A finally failed item, reported with its last error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailedItemDiagnostic {
    pub batch_id: u32,
    pub item: WorkItem,
    pub last_error: ItemError,
    pub last_round: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_boundaries() {
        assert_eq!(BatchStatus::from_rate(0.8, 0.8, 0.5), BatchStatus::Success);
        assert_eq!(BatchStatus::from_rate(1.0, 0.8, 0.5), BatchStatus::Success);
        assert_eq!(
            BatchStatus::from_rate(0.79, 0.8, 0.5),
            BatchStatus::PartialSuccess
        );
        assert_eq!(
            BatchStatus::from_rate(0.5, 0.8, 0.5),
            BatchStatus::PartialSuccess
        );
        assert_eq!(BatchStatus::from_rate(0.49, 0.8, 0.5), BatchStatus::Failed);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&BatchStatus::PartialSuccess).unwrap();
        assert_eq!(json, "\"partial_success\"");
    }
}
