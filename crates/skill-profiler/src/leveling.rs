//! Experience to level mapping.

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// One step of a [`LevelTable`]. Levels are numbered from 1 in table order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelTier {
    /// Minimum experience for this level
    pub threshold: u64,
    pub name: String,
}

impl LevelTier {
    pub fn new(threshold: u64, name: impl Into<String>) -> Self {
        Self {
            threshold,
            name: name.into(),
        }
    }
}

/// A monotonically increasing threshold table.
///
/// Deserialisation goes through [`LevelTable::new`], so a loaded table obeys
/// the same invariants as a constructed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLevelTable")]
pub struct LevelTable {
    tiers: Vec<LevelTier>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawLevelTable {
    tiers: Vec<LevelTier>,
}

impl TryFrom<RawLevelTable> for LevelTable {
    type Error = ConfigError;

    fn try_from(raw: RawLevelTable) -> Result<Self, Self::Error> {
        LevelTable::new(raw.tiers)
    }
}

/// Where an experience value sits in a [`LevelTable`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: u32,
    pub level_name: String,
    pub experience: u64,
    pub current_level_exp: u64,
    /// Threshold of the next level; equals `current_level_exp` at the top
    pub next_level_exp: u64,
    /// Progress toward the next level, `[0, 100]`, one decimal
    pub progress_percentage: f64,
}

impl LevelInfo {
    pub fn is_max_level(&self) -> bool {
        self.next_level_exp == self.current_level_exp
    }
}

const STANDARD_TIERS: [(u64, &str); 10] = [
    (0, "Novice"),
    (100, "Beginner"),
    (300, "Elementary"),
    (600, "Intermediate"),
    (1_000, "Advanced"),
    (2_000, "Expert"),
    (4_000, "Senior"),
    (7_000, "Lead"),
    (10_000, "Architect"),
    (15_000, "Master"),
];

impl Default for LevelTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl LevelTable {
    /// Build a table. The first tier must start at 0 and thresholds must
    /// strictly increase, so every experience value maps to exactly one
    /// level.
    pub fn new(tiers: Vec<LevelTier>) -> Result<Self, ConfigError> {
        let first = tiers
            .first()
            .ok_or_else(|| ConfigError::InvalidLevelTable("table is empty".to_string()))?;
        if first.threshold != 0 {
            return Err(ConfigError::InvalidLevelTable(format!(
                "first threshold must be 0, got {}",
                first.threshold
            )));
        }
        if let Some(pair) = tiers.windows(2).find(|w| w[1].threshold <= w[0].threshold) {
            return Err(ConfigError::InvalidLevelTable(format!(
                "threshold {} of {:?} does not exceed {} of {:?}",
                pair[1].threshold, pair[1].name, pair[0].threshold, pair[0].name
            )));
        }
        Ok(Self { tiers })
    }

    /// The ten-tier table, Novice (0) through Master (15000).
    pub fn standard() -> Self {
        Self {
            tiers: STANDARD_TIERS
                .iter()
                .map(|&(threshold, name)| LevelTier::new(threshold, name))
                .collect(),
        }
    }

    pub fn tiers(&self) -> &[LevelTier] {
        &self.tiers
    }

    pub fn max_level(&self) -> u32 {
        self.tiers.len() as u32
    }

    /// Total for any `experience`; at or past the top tier progress is 100.
    pub fn level_for(&self, experience: u64) -> LevelInfo {
        let idx = self
            .tiers
            .iter()
            .rposition(|t| t.threshold <= experience)
            .unwrap_or(0);
        let tier = &self.tiers[idx];
        let current_level_exp = tier.threshold;

        let (next_level_exp, progress) = match self.tiers.get(idx + 1) {
            Some(next) => {
                let span = (next.threshold - current_level_exp) as f64;
                let gained = experience.saturating_sub(current_level_exp) as f64;
                (next.threshold, (gained / span * 100.0).clamp(0.0, 100.0))
            }
            None => (current_level_exp, 100.0),
        };

        LevelInfo {
            level: idx as u32 + 1,
            level_name: tier.name.clone(),
            experience,
            current_level_exp,
            next_level_exp,
            progress_percentage: round1(progress),
        }
    }
}

pub(crate) fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
