//! Deduplication and profile aggregation.
//!
//! All classification matches of a run are grouped by `(skill_name, level)`
//! into [`CanonicalSkill`]s carrying the mean confidence. Groups below the
//! dedup floor are dropped. Counts, coverage and experience are computed
//! over the surviving set only, so a skill seen many times contributes its
//! `base_weight` once.
//!
//! Nothing here depends on arrival order: group members are combined in a
//! sorted order and ties are broken lexicographically.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use skill_catalog::{CatalogStats, SkillKey, SkillLevel};
use tracing::info;

use crate::leveling::{round1, LevelInfo, LevelTable};
use crate::outcome::{BatchOutcome, ClassificationMatch, MissingSkillSuggestion};

/// A deduplicated `(skill_name, level)` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSkill {
    pub skill_name: String,
    pub level: SkillLevel,
    pub category: String,
    pub subcategory: String,
    /// Mean confidence over every match that shares the key
    pub confidence: f64,
    pub occurrence_count: u32,
    pub base_weight: u32,
    pub partition_tags: Vec<String>,
}

impl CanonicalSkill {
    pub fn key(&self) -> SkillKey {
        SkillKey::new(self.skill_name.clone(), self.level)
    }
}

impl From<&ClassificationMatch> for CanonicalSkill {
    fn from(m: &ClassificationMatch) -> Self {
        Self {
            skill_name: m.skill_name.clone(),
            level: m.level,
            category: m.category.clone(),
            subcategory: m.subcategory.clone(),
            confidence: m.confidence,
            occurrence_count: 1,
            base_weight: m.base_weight,
            partition_tags: m.partition_tags.clone(),
        }
    }
}

/// Aggregation options, usually taken from
/// [`ProfilerConfig::aggregation_policy`](crate::config::ProfilerConfig::aggregation_policy).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    pub dedup_confidence_floor: f64,
    pub top_skills_limit: usize,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            dedup_confidence_floor: 0.3,
            top_skills_limit: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStats {
    pub count: usize,
    pub levels: BTreeMap<SkillLevel, usize>,
    /// Two decimals
    pub mean_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coverage {
    pub owned: usize,
    pub total: usize,
    /// `owned / total * 100`, one decimal; 0 when the catalog has no entry
    pub percentage: f64,
}

impl Coverage {
    fn new(owned: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            round1(owned as f64 / total as f64 * 100.0)
        };
        Self {
            owned,
            total,
            percentage,
        }
    }
}

/// Coverage and level scoped to one catalog partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionProfile {
    pub owned_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub experience: u64,
    pub level: LevelInfo,
}

/// Final, read-only profile of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedProfile {
    pub total_skills: usize,
    /// Confidence descending, then key
    pub skills: Vec<CanonicalSkill>,
    pub skills_by_category: BTreeMap<String, CategoryStats>,
    pub skills_by_level: BTreeMap<SkillLevel, usize>,
    pub category_coverage: BTreeMap<String, Coverage>,
    pub total_coverage: f64,
    pub top_skills: Vec<CanonicalSkill>,
    pub total_experience: u64,
    pub level_info: LevelInfo,
    pub per_partition_coverage: BTreeMap<String, PartitionProfile>,
    /// Advisory, deduplicated by `(suggested_name, suggested_level)`
    pub suggestions: Vec<MissingSkillSuggestion>,
}

/// Group raw matches into canonical skills.
pub fn canonicalize<'a, I>(matches: I, floor: f64) -> Vec<CanonicalSkill>
where
    I: IntoIterator<Item = &'a ClassificationMatch>,
{
    merge_canonical(matches.into_iter().map(CanonicalSkill::from), floor)
}

/// Merge canonical skills sharing a key, weighting each confidence by its
/// occurrence count. Applying this to its own output returns it unchanged.
pub fn merge_canonical<I>(skills: I, floor: f64) -> Vec<CanonicalSkill>
where
    I: IntoIterator<Item = CanonicalSkill>,
{
    let mut groups: BTreeMap<SkillKey, Vec<CanonicalSkill>> = BTreeMap::new();
    for skill in skills {
        groups.entry(skill.key()).or_default().push(skill);
    }

    let mut merged: Vec<CanonicalSkill> = groups
        .into_values()
        .filter_map(merge_group)
        .filter(|s| s.confidence >= floor)
        .collect();

    merged.sort_by(|a, b| {
        b.confidence
            .total_cmp(&a.confidence)
            .then_with(|| a.key().cmp(&b.key()))
    });
    merged
}

fn merge_group(mut group: Vec<CanonicalSkill>) -> Option<CanonicalSkill> {
    if group.len() <= 1 {
        return group.pop();
    }
    group.sort_by(|a, b| {
        a.confidence
            .total_cmp(&b.confidence)
            .then_with(|| a.occurrence_count.cmp(&b.occurrence_count))
    });

    let occurrences: u32 = group.iter().map(|s| s.occurrence_count).sum();
    let weighted: f64 = group
        .iter()
        .map(|s| s.confidence * f64::from(s.occurrence_count))
        .sum();
    let confidence = if occurrences == 0 {
        0.0
    } else {
        weighted / f64::from(occurrences)
    };

    let base_weight = group.iter().map(|s| s.base_weight).max().unwrap_or(0);
    let tags: BTreeSet<String> = group
        .iter()
        .flat_map(|s| s.partition_tags.iter().cloned())
        .collect();
    let labels = group
        .iter()
        .map(|s| (s.category.clone(), s.subcategory.clone()))
        .min();
    let first = group.swap_remove(0);
    let (category, subcategory) = labels.unwrap_or((first.category, first.subcategory));

    Some(CanonicalSkill {
        skill_name: first.skill_name,
        level: first.level,
        category,
        subcategory,
        confidence,
        occurrence_count: occurrences,
        base_weight,
        partition_tags: tags.into_iter().collect(),
    })
}

/// Sum of `base_weight` over a deduplicated set.
pub fn total_experience(skills: &[CanonicalSkill]) -> u64 {
    skills.iter().map(|s| u64::from(s.base_weight)).sum()
}

/// Keep the first suggestion per `(suggested_name, suggested_level)`.
pub fn dedup_suggestions<'a, I>(suggestions: I) -> Vec<MissingSkillSuggestion>
where
    I: IntoIterator<Item = &'a MissingSkillSuggestion>,
{
    let mut seen = BTreeSet::new();
    suggestions
        .into_iter()
        .filter(|s| seen.insert((s.suggested_name.clone(), s.suggested_level)))
        .cloned()
        .collect()
}

/// Aggregate the final outcomes of a run into a profile.
pub fn aggregate(
    outcomes: &[BatchOutcome],
    catalog: &CatalogStats,
    policy: &AggregationPolicy,
    levels: &LevelTable,
) -> AggregatedProfile {
    let skills = canonicalize(
        outcomes.iter().flat_map(|o| o.matches.iter()),
        policy.dedup_confidence_floor,
    );
    let suggestions = dedup_suggestions(outcomes.iter().flat_map(|o| o.suggestions.iter()));
    build_profile(skills, suggestions, catalog, policy, levels)
}

/// Build a profile from an already deduplicated skill set.
pub fn build_profile(
    skills: Vec<CanonicalSkill>,
    suggestions: Vec<MissingSkillSuggestion>,
    catalog: &CatalogStats,
    policy: &AggregationPolicy,
    levels: &LevelTable,
) -> AggregatedProfile {
    let mut skills_by_level: BTreeMap<SkillLevel, usize> =
        SkillLevel::ALL.iter().map(|&l| (l, 0)).collect();
    let mut by_category: BTreeMap<String, Vec<&CanonicalSkill>> = BTreeMap::new();
    for skill in &skills {
        *skills_by_level.entry(skill.level).or_default() += 1;
        by_category
            .entry(skill.category.clone())
            .or_default()
            .push(skill);
    }

    let skills_by_category = by_category
        .iter()
        .map(|(category, members)| {
            let mut level_counts: BTreeMap<SkillLevel, usize> =
                SkillLevel::ALL.iter().map(|&l| (l, 0)).collect();
            for member in members {
                *level_counts.entry(member.level).or_default() += 1;
            }
            let mean = members.iter().map(|m| m.confidence).sum::<f64>() / members.len() as f64;
            (
                category.clone(),
                CategoryStats {
                    count: members.len(),
                    levels: level_counts,
                    mean_confidence: (mean * 100.0).round() / 100.0,
                },
            )
        })
        .collect();

    let category_names: BTreeSet<&String> = catalog
        .per_category
        .keys()
        .chain(by_category.keys())
        .collect();
    let category_coverage = category_names
        .into_iter()
        .map(|category| {
            let owned = by_category.get(category).map_or(0, Vec::len);
            (
                category.clone(),
                Coverage::new(owned, catalog.category_total(category)),
            )
        })
        .collect();
    let total_coverage = Coverage::new(skills.len(), catalog.total_skills).percentage;

    let per_partition_coverage = partition_profiles(&skills, catalog, levels);

    let total_experience = total_experience(&skills);
    let level_info = levels.level_for(total_experience);
    let top_skills = skills
        .iter()
        .take(policy.top_skills_limit)
        .cloned()
        .collect();

    info!(
        total_skills = skills.len(),
        total_experience,
        level = level_info.level,
        level_name = %level_info.level_name,
        "profile aggregated"
    );

    AggregatedProfile {
        total_skills: skills.len(),
        skills,
        skills_by_category,
        skills_by_level,
        category_coverage,
        total_coverage,
        top_skills,
        total_experience,
        level_info,
        per_partition_coverage,
        suggestions,
    }
}

fn partition_profiles(
    skills: &[CanonicalSkill],
    catalog: &CatalogStats,
    levels: &LevelTable,
) -> BTreeMap<String, PartitionProfile> {
    let mut owned: BTreeMap<String, (usize, u64)> = catalog
        .per_partition
        .keys()
        .map(|p| (p.clone(), (0, 0)))
        .collect();
    for skill in skills {
        let tags: BTreeSet<&str> = skill
            .partition_tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .collect();
        for tag in tags {
            let slot = owned.entry(tag.to_string()).or_default();
            slot.0 += 1;
            slot.1 += u64::from(skill.base_weight);
        }
    }

    owned
        .into_iter()
        .map(|(partition, (owned_count, experience))| {
            let coverage = Coverage::new(owned_count, catalog.partition_total(&partition));
            let profile = PartitionProfile {
                owned_count,
                total_count: coverage.total,
                percentage: coverage.percentage,
                experience,
                level: levels.level_for(experience),
            };
            (partition, profile)
        })
        .collect()
}
