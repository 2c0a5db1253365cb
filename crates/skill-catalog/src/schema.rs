//! Strict response schema for classifier payloads.
//!
//! A payload is accepted only if it is a single JSON object of the shape
//!
//! ```json
//! {
//!   "matches": [
//!     {"skill_name": "...", "level": "Basic|Intermediate|Advanced",
//!      "category": "...", "subcategory": "...",
//!      "confidence": 0.85, "rationale": "..."}
//!   ],
//!   "suggestions": [
//!     {"suggested_name": "...", "suggested_level": "Advanced",
//!      "suggested_category": "...", "suggested_subcategory": "...",
//!      "description": "...", "evidence": "..."}
//!   ]
//! }
//! ```
//!
//! Unknown fields, unknown levels, string-encoded arrays and confidences
//! outside `[0, 1]` are all rejected with [`ClassifyError::Validation`].

use tracing::debug;

use crate::error::ClassifyError;
use crate::model::ClassificationResult;

/// Parse and validate a raw classifier payload.
pub fn parse_classification(raw: &str) -> Result<ClassificationResult, ClassifyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ClassifyError::Validation("empty response".to_string()));
    }

    let result: ClassificationResult = serde_json::from_str(trimmed).map_err(|e| {
        debug!(error = %e, "classifier payload rejected by schema");
        ClassifyError::Validation(e.to_string())
    })?;
    result.validate()?;
    Ok(result)
}
