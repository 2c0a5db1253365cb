//! Catalog, work-item and classifier wire types.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifyError, ModelError};

// ---------------------------------------------------------------------------
// Skill catalog
// ---------------------------------------------------------------------------

/// Proficiency tier of a catalog skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SkillLevel {
    Basic,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    /// All levels, lowest first.
    pub const ALL: [SkillLevel; 3] = [
        SkillLevel::Basic,
        SkillLevel::Intermediate,
        SkillLevel::Advanced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillLevel::Basic => "Basic",
            SkillLevel::Intermediate => "Intermediate",
            SkillLevel::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for SkillLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Basic" => Ok(SkillLevel::Basic),
            "Intermediate" => Ok(SkillLevel::Intermediate),
            "Advanced" => Ok(SkillLevel::Advanced),
            other => Err(ModelError::UnknownLevel(other.to_string())),
        }
    }
}

/// Identity of a catalog skill: the same name at a different level is a
/// different skill.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SkillKey {
    pub skill_name: String,
    pub level: SkillLevel,
}

impl SkillKey {
    pub fn new(skill_name: impl Into<String>, level: SkillLevel) -> Self {
        Self {
            skill_name: skill_name.into(),
            level,
        }
    }
}

impl fmt::Display for SkillKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.skill_name, self.level)
    }
}

/// One skill of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub skill_name: String,
    pub level: SkillLevel,
    pub category: String,
    pub subcategory: String,
    #[serde(default)]
    pub description: String,
    /// Experience granted for owning this skill
    pub base_weight: u32,
    /// Subject-type partitions (e.g. "Backend", "AI/ML"). Empty means the
    /// skill is common to every partition and counts toward none of them.
    #[serde(default)]
    pub partition_tags: Vec<String>,
}

impl CatalogEntry {
    pub fn new(
        skill_name: impl Into<String>,
        level: SkillLevel,
        category: impl Into<String>,
        subcategory: impl Into<String>,
        base_weight: u32,
    ) -> Self {
        Self {
            skill_name: skill_name.into(),
            level,
            category: category.into(),
            subcategory: subcategory.into(),
            description: String::new(),
            base_weight,
            partition_tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_partitions<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn key(&self) -> SkillKey {
        SkillKey::new(self.skill_name.clone(), self.level)
    }
}

/// Size of the catalog per category and per partition, counted over unique
/// `(skill_name, level)` keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogStats {
    pub total_skills: usize,
    pub per_category: BTreeMap<String, usize>,
    pub per_partition: BTreeMap<String, usize>,
}

impl CatalogStats {
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a CatalogEntry>,
    {
        let mut seen = BTreeSet::new();
        let mut stats = CatalogStats::default();

        for entry in entries {
            if !seen.insert(entry.key()) {
                continue;
            }
            stats.total_skills += 1;
            *stats.per_category.entry(entry.category.clone()).or_default() += 1;
            let tags: BTreeSet<&str> = entry.partition_tags.iter().map(|t| t.trim()).collect();
            for tag in tags.into_iter().filter(|t| !t.is_empty()) {
                *stats.per_partition.entry(tag.to_string()).or_default() += 1;
            }
        }

        stats
    }

    pub fn category_total(&self, category: &str) -> usize {
        self.per_category.get(category).copied().unwrap_or(0)
    }

    pub fn partition_total(&self, partition: &str) -> usize {
        self.per_partition.get(partition).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// Where a fragment was extracted from.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line_start: u32,
    pub line_end: u32,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line_start: u32, line_end: u32) -> Self {
        Self {
            file: file.into(),
            line_start,
            line_end,
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.file, self.line_start, self.line_end)
    }
}

/// One extracted code fragment to classify. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    /// Opaque code text
    pub payload: String,
    pub source: SourceLocation,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, payload: impl Into<String>, source: SourceLocation) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            source,
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier wire model
// ---------------------------------------------------------------------------

/// A classifier's claim that an item exhibits a catalog skill.
///
/// Carries no score: the engine resolves `base_weight` from the candidate
/// entries it handed to the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SkillJudgement {
    pub skill_name: String,
    pub level: SkillLevel,
    pub category: String,
    pub subcategory: String,
    /// Relevance in `[0, 1]`
    pub confidence: f64,
    pub rationale: String,
}

impl SkillJudgement {
    pub fn key(&self) -> SkillKey {
        SkillKey::new(self.skill_name.clone(), self.level)
    }
}

/// A skill the classifier saw in the code but could not find among the
/// candidates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SuggestionDraft {
    pub suggested_name: String,
    pub suggested_level: SkillLevel,
    pub suggested_category: String,
    pub suggested_subcategory: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub evidence: String,
}

/// Schema-valid classifier response for one work item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassificationResult {
    #[serde(default)]
    pub matches: Vec<SkillJudgement>,
    #[serde(default)]
    pub suggestions: Vec<SuggestionDraft>,
}

impl ClassificationResult {
    /// A valid "nothing found" response.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_match(mut self, judgement: SkillJudgement) -> Self {
        self.matches.push(judgement);
        self
    }

    pub fn with_suggestion(mut self, draft: SuggestionDraft) -> Self {
        self.suggestions.push(draft);
        self
    }

    /// Check the value-level constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ClassifyError> {
        for (idx, m) in self.matches.iter().enumerate() {
            if m.skill_name.trim().is_empty() {
                return Err(ClassifyError::Validation(format!(
                    "matches[{idx}].skill_name must not be empty"
                )));
            }
            if !m.confidence.is_finite() || !(0.0..=1.0).contains(&m.confidence) {
                return Err(ClassifyError::Validation(format!(
                    "matches[{idx}].confidence {} is outside [0, 1]",
                    m.confidence
                )));
            }
        }
        for (idx, s) in self.suggestions.iter().enumerate() {
            if s.suggested_name.trim().is_empty() {
                return Err(ClassifyError::Validation(format!(
                    "suggestions[{idx}].suggested_name must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, level: SkillLevel, category: &str, tags: &[&str]) -> CatalogEntry {
        CatalogEntry::new(name, level, category, "general", 10).with_partitions(tags.iter().copied())
    }

    #[test]
    fn test_skill_level_round_trips_through_str() {
        for level in SkillLevel::ALL {
            assert_eq!(level.as_str().parse::<SkillLevel>().unwrap(), level);
        }
        assert!("Expert".parse::<SkillLevel>().is_err());
    }

    #[test]
    fn test_catalog_stats_counts_unique_keys() {
        let entries = vec![
            entry("asyncio", SkillLevel::Basic, "Async", &["Backend"]),
            entry("asyncio", SkillLevel::Basic, "Async", &["Backend"]),
            entry("asyncio", SkillLevel::Advanced, "Async", &["Backend", "Data"]),
            entry("FastAPI", SkillLevel::Intermediate, "Web", &[]),
        ];

        let stats = CatalogStats::from_entries(&entries);

        assert_eq!(stats.total_skills, 3);
        assert_eq!(stats.category_total("Async"), 2);
        assert_eq!(stats.category_total("Web"), 1);
        assert_eq!(stats.category_total("Missing"), 0);
        assert_eq!(stats.partition_total("Backend"), 2);
        assert_eq!(stats.partition_total("Data"), 1);
        assert!(!stats.per_partition.contains_key(""));
    }

    #[test]
    fn test_validate_rejects_out_of_range_confidence() {
        let result = ClassificationResult::empty().with_match(SkillJudgement {
            skill_name: "FastAPI".to_string(),
            level: SkillLevel::Intermediate,
            category: "Web".to_string(),
            subcategory: "FastAPI".to_string(),
            confidence: 1.2,
            rationale: "router decorators".to_string(),
        });

        let err = result.validate().unwrap_err();
        assert!(matches!(err, ClassifyError::Validation(_)));
        assert!(err.to_string().contains("matches[0].confidence"));
    }

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation::new("src/api/client.py", 42, 58);
        assert_eq!(loc.to_string(), "src/api/client.py:42-58");
    }
}
