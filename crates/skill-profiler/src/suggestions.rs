//! Noise filter for advisory missing-skill suggestions.
//!
//! Classifiers tend to propose "skills" that are plain language syntax,
//! trivial standard-library calls or generic activity names. The filter
//! drops those before suggestions are exported for catalog curation. It is
//! never applied inside aggregation.

use regex::Regex;
use serde::{Deserialize, Serialize};
use skill_catalog::SkillLevel;
use tracing::debug;

use crate::outcome::MissingSkillSuggestion;

/// Why a suggestion was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseReason {
    BasicSyntax,
    StdlibBasics,
    GenericName,
    CoveredByCatalog,
    UnsupportedClaim,
    TrivialDefinition,
}

const GENERIC_NAMES: &[&str] = &[
    "image processing",
    "data processing",
    "file processing",
    "string processing",
    "image preprocessing",
    "data preprocessing",
    "code execution",
    "module execution",
    "function definition",
    "class definition",
    "variable declaration",
    "list processing",
    "dictionary processing",
    "loops",
    "conditionals",
    "exception handling",
    "file reading",
    "file writing",
    "file opening",
    "main function",
    "image viewer",
];

/// Library name to the catalog categories that already cover it.
const COVERED_LIBRARIES: &[(&str, &[&str])] = &[
    ("opencv", &["computer vision", "image processing", "multimedia"]),
    ("cv2", &["computer vision", "image processing", "multimedia"]),
    ("flask", &["web framework"]),
    ("django", &["web framework"]),
    ("fastapi", &["web framework"]),
    ("pandas", &["data analysis"]),
    ("numpy", &["data analysis", "scientific computing"]),
    ("matplotlib", &["data analysis", "visualization"]),
    ("asyncio", &["async programming"]),
    ("aiohttp", &["async programming", "networking"]),
    ("zipfile", &["file handling"]),
    ("pyaudio", &["multimedia", "audio"]),
];

/// Rule set deciding whether a suggestion is noise.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    syntax_name: Regex,
    syntax_code: Regex,
    stdlib_name: Regex,
    stdlib_code: Regex,
    generic_pattern: Regex,
    specific_library: Regex,
    augmentation_name: Regex,
    augmentation_code: Regex,
    definition_code: Regex,
}

impl NoiseFilter {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            syntax_name: Regex::new(
                r"(?i)(__main__|\b(main|function|class|import|return|if|for|while|else|elif)\b)",
            )?,
            syntax_code: Regex::new(
                r"(?i)(__main__|\b(def|class|import|from|return|if|for|while)\s|\b(else|elif)\b)",
            )?,
            stdlib_name: Regex::new(
                r"(?i)\b(os|sys|pathlib|json|csv|datetime|random|math|socket)\b",
            )?,
            stdlib_code: Regex::new(
                r"(?i)\b(os\.(path|listdir|getcwd)|sys\.(argv|path|exit)|pathlib\.path|datetime\.(datetime|date)|json\.(loads?|dumps?)|csv\.(reader|writer)|collections\.|itertools\.|random\.|math\.|socket\.)",
            )?,
            generic_pattern: Regex::new(
                r"(?i)\b(viewer|processing|implementation|definition|execution|usage)\b",
            )?,
            specific_library: Regex::new(
                r"(?i)\b(yolov8|yolo|ultralytics|fastapi|django|flask|pytorch|tensorflow|keras|opencv|cv2|aiohttp|asyncio|sqlalchemy|pandas|numpy|matplotlib|scikit|detectron)\b",
            )?,
            augmentation_name: Regex::new(r"(?i)(augment|transform)")?,
            augmentation_code: Regex::new(
                r"(?i)(augment|transforms|rotation|flip|crop|brightness|contrast|noise)",
            )?,
            definition_code: Regex::new(r"(?m)^\s*(def|class)\s")?,
        })
    }

    /// The first rule `suggestion` trips, if any.
    pub fn classify(&self, suggestion: &MissingSkillSuggestion) -> Option<NoiseReason> {
        let name = suggestion.suggested_name.trim();
        let code = suggestion.code_excerpt.as_str();
        let is_basic = suggestion.suggested_level == SkillLevel::Basic;

        if self.syntax_name.is_match(name) && self.syntax_code.is_match(code) {
            return Some(NoiseReason::BasicSyntax);
        }

        if self.stdlib_name.is_match(name) && (is_basic || self.stdlib_code.is_match(code)) {
            return Some(NoiseReason::StdlibBasics);
        }

        let lowered = name.to_lowercase();
        if GENERIC_NAMES.contains(&lowered.as_str()) {
            return Some(NoiseReason::GenericName);
        }
        let names_library = self.specific_library.is_match(name);
        if name.split_whitespace().count() <= 3
            && self.generic_pattern.is_match(name)
            && !names_library
        {
            return Some(NoiseReason::GenericName);
        }

        if !names_library {
            let code_lower = code.to_lowercase();
            let category = suggestion.suggested_category.to_lowercase();
            let covered = COVERED_LIBRARIES.iter().any(|(library, categories)| {
                code_lower.contains(library) && categories.iter().any(|c| category.contains(c))
            });
            if covered {
                return Some(NoiseReason::CoveredByCatalog);
            }
        }

        if self.augmentation_name.is_match(name) && !self.augmentation_code.is_match(code) {
            return Some(NoiseReason::UnsupportedClaim);
        }

        if is_basic && self.definition_code.is_match(code) {
            let meaningful = code
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#') && !l.starts_with("\"\"\""))
                .count();
            if meaningful <= 3 {
                return Some(NoiseReason::TrivialDefinition);
            }
        }

        None
    }

    /// Split suggestions into kept and dropped, preserving order.
    pub fn apply(
        &self,
        suggestions: Vec<MissingSkillSuggestion>,
    ) -> (
        Vec<MissingSkillSuggestion>,
        Vec<(MissingSkillSuggestion, NoiseReason)>,
    ) {
        let mut kept = Vec::new();
        let mut dropped = Vec::new();
        for suggestion in suggestions {
            match self.classify(&suggestion) {
                Some(reason) => {
                    debug!(name = %suggestion.suggested_name, ?reason, "suggestion filtered");
                    dropped.push((suggestion, reason));
                }
                None => kept.push(suggestion),
            }
        }
        (kept, dropped)
    }
}
