//! Engine configuration.
//!
//! [`ProfilerConfig`] is plain data. It is validated once, before any
//! dispatch, and then shared read-only through the
//! [`ProfilerContext`](crate::context::ProfilerContext).

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::aggregate::AggregationPolicy;

/// Prefix of the environment variables read by [`ProfilerConfig::from_env`].
pub const ENV_PREFIX: &str = "SKILLPROF_";

/// Rejected configuration. Fatal at startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range, expected {expected}")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{field} must be at least 1")]
    NonPositive { field: &'static str },

    #[error("environment variable {var} has unparseable value {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("invalid level table: {0}")]
    InvalidLevelTable(String),
}

/// Tunable parameters of a profiling run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfilerConfig {
    /// Upper bound on batches, and on batches in flight at once
    pub max_workers: usize,
    pub target_batch_size: usize,
    /// Candidates fetched from the index per item
    pub top_k_candidates: usize,
    /// Matches below this confidence are discarded by the batch worker
    pub confidence_threshold: f64,
    /// A batch at or above this cumulative rate is done
    pub success_rate_threshold: f64,
    /// Lower bound of the `partial_success` status
    pub partial_success_threshold: f64,
    pub max_retry_rounds: u32,
    /// Canonical skills whose mean confidence falls below this are dropped
    pub dedup_confidence_floor: f64,
    pub item_timeout_ms: u64,
    pub top_skills_limit: usize,
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            max_workers: 50,
            target_batch_size: 10,
            top_k_candidates: 20,
            confidence_threshold: 0.5,
            success_rate_threshold: 0.8,
            partial_success_threshold: 0.5,
            max_retry_rounds: 3,
            dedup_confidence_floor: 0.3,
            item_timeout_ms: 60_000,
            top_skills_limit: 10,
        }
    }
}

fn check_usize(
    field: &'static str,
    value: usize,
    min: usize,
    max: usize,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if value < 1 && min >= 1 {
        return Err(ConfigError::NonPositive { field });
    }
    if !(min..=max).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        });
    }
    Ok(())
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            expected: "[0, 1]",
        });
    }
    Ok(())
}

impl ProfilerConfig {
    /// Check every option against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_usize("max_workers", self.max_workers, 1, 100, "[1, 100]")?;
        check_usize("target_batch_size", self.target_batch_size, 1, 50, "[1, 50]")?;
        check_usize("top_k_candidates", self.top_k_candidates, 5, 50, "[5, 50]")?;
        check_unit("confidence_threshold", self.confidence_threshold)?;
        check_unit("success_rate_threshold", self.success_rate_threshold)?;
        check_unit("partial_success_threshold", self.partial_success_threshold)?;
        if self.partial_success_threshold > self.success_rate_threshold {
            return Err(ConfigError::OutOfRange {
                field: "partial_success_threshold",
                value: self.partial_success_threshold.to_string(),
                expected: "<= success_rate_threshold",
            });
        }
        if self.max_retry_rounds > 3 {
            return Err(ConfigError::OutOfRange {
                field: "max_retry_rounds",
                value: self.max_retry_rounds.to_string(),
                expected: "[0, 3]",
            });
        }
        check_unit("dedup_confidence_floor", self.dedup_confidence_floor)?;
        if self.item_timeout_ms == 0 {
            return Err(ConfigError::NonPositive {
                field: "item_timeout_ms",
            });
        }
        Ok(())
    }

    /// Defaults overlaid with `SKILLPROF_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overlaid with values from `lookup`, keyed by the full
    /// variable name (e.g. `SKILLPROF_MAX_WORKERS`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn read<T: std::str::FromStr, F: Fn(&str) -> Option<String>>(
            lookup: &F,
            name: &str,
            slot: &mut T,
        ) -> Result<(), ConfigError> {
            let var = format!("{ENV_PREFIX}{name}");
            if let Some(raw) = lookup(&var) {
                *slot = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: var.clone(),
                    value: raw.clone(),
                })?;
            }
            Ok(())
        }

        let mut cfg = Self::default();
        read(&lookup, "MAX_WORKERS", &mut cfg.max_workers)?;
        read(&lookup, "TARGET_BATCH_SIZE", &mut cfg.target_batch_size)?;
        read(&lookup, "TOP_K_CANDIDATES", &mut cfg.top_k_candidates)?;
        read(&lookup, "CONFIDENCE_THRESHOLD", &mut cfg.confidence_threshold)?;
        read(&lookup, "SUCCESS_RATE_THRESHOLD", &mut cfg.success_rate_threshold)?;
        read(
            &lookup,
            "PARTIAL_SUCCESS_THRESHOLD",
            &mut cfg.partial_success_threshold,
        )?;
        read(&lookup, "MAX_RETRY_ROUNDS", &mut cfg.max_retry_rounds)?;
        read(&lookup, "DEDUP_CONFIDENCE_FLOOR", &mut cfg.dedup_confidence_floor)?;
        read(&lookup, "ITEM_TIMEOUT_MS", &mut cfg.item_timeout_ms)?;
        read(&lookup, "TOP_SKILLS_LIMIT", &mut cfg.top_skills_limit)?;
        Ok(cfg)
    }

    pub fn item_timeout(&self) -> Duration {
        Duration::from_millis(self.item_timeout_ms)
    }

    /// The subset of options the aggregator needs.
    pub fn aggregation_policy(&self) -> AggregationPolicy {
        AggregationPolicy {
            dedup_confidence_floor: self.dedup_confidence_floor,
            top_skills_limit: self.top_skills_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = ProfilerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_workers, 50);
        assert_eq!(cfg.max_retry_rounds, 3);
        assert_eq!(cfg.item_timeout(), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_workers_is_non_positive() {
        let cfg = ProfilerConfig {
            max_workers: 0,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::NonPositive {
                field: "max_workers"
            })
        );
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let too_many = ProfilerConfig {
            max_workers: 101,
            ..Default::default()
        };
        assert!(matches!(
            too_many.validate(),
            Err(ConfigError::OutOfRange {
                field: "max_workers",
                ..
            })
        ));

        let few_candidates = ProfilerConfig {
            top_k_candidates: 4,
            ..Default::default()
        };
        assert!(few_candidates.validate().is_err());

        let nan = ProfilerConfig {
            confidence_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(nan.validate().is_err());

        let rounds = ProfilerConfig {
            max_retry_rounds: 4,
            ..Default::default()
        };
        assert!(rounds.validate().is_err());
    }

    #[test]
    fn test_partial_threshold_cannot_exceed_success_threshold() {
        let cfg = ProfilerConfig {
            success_rate_threshold: 0.6,
            partial_success_threshold: 0.7,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("partial_success_threshold"));
    }

    #[test]
    fn test_from_lookup_overlays_defaults() {
        let vars: HashMap<&str, &str> = [
            ("SKILLPROF_MAX_WORKERS", "8"),
            ("SKILLPROF_CONFIDENCE_THRESHOLD", " 0.65 "),
        ]
        .into_iter()
        .collect();

        let cfg = ProfilerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(cfg.max_workers, 8);
        assert!((cfg.confidence_threshold - 0.65).abs() < f64::EPSILON);
        assert_eq!(cfg.target_batch_size, 10);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = ProfilerConfig::from_lookup(|k| {
            (k == "SKILLPROF_MAX_RETRY_ROUNDS").then(|| "three".to_string())
        })
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidEnv {
                var: "SKILLPROF_MAX_RETRY_ROUNDS".into(),
                value: "three".into(),
            }
        );
    }
}
