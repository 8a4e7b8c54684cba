//! Regulatory coverage derived from extracted records
//!
//! Everything here is derived and read-only: it is regenerated whenever the
//! record set changes and never persisted independently of its source record.

use serde::{Deserialize, Serialize};

/// How strongly a record category evidences a requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStrength {
    /// Partially addresses the requirement
    Partial,
    /// Fully addresses the requirement
    Full,
}

impl CoverageStrength {
    /// Get the strength as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageStrength::Partial => "partial",
            CoverageStrength::Full => "full",
        }
    }
}

/// Link from one extracted record to one regulatory requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageMapping {
    /// Natural key of the source record
    pub source_natural_key: String,
    /// Area of the source record
    pub source_area: String,
    /// Requirement identifier (e.g. "Article 8")
    pub target_requirement_id: String,
    /// Requirement title
    pub target_requirement_name: String,
    /// Strength of the linkage
    pub strength: CoverageStrength,
    /// Human-readable explanation, including any confidence discount
    pub note: String,
    /// Confidence [0, 1]
    pub confidence: f64,
}

/// Aggregate coverage level of one requirement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageLevel {
    /// No record evidences the requirement
    None,
    /// Only partial evidence
    Partial,
    /// At least one full-strength mapping
    Full,
}

impl CoverageLevel {
    /// Score contribution of this level
    pub fn score(&self) -> f64 {
        match self {
            CoverageLevel::None => 0.0,
            CoverageLevel::Partial => 0.5,
            CoverageLevel::Full => 1.0,
        }
    }

    /// Get the level as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            CoverageLevel::None => "none",
            CoverageLevel::Partial => "partial",
            CoverageLevel::Full => "full",
        }
    }
}

impl From<CoverageStrength> for CoverageLevel {
    fn from(strength: CoverageStrength) -> Self {
        match strength {
            CoverageStrength::Partial => CoverageLevel::Partial,
            CoverageStrength::Full => CoverageLevel::Full,
        }
    }
}

/// Coverage of a single requirement across all mappings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementCoverage {
    /// Requirement identifier
    pub requirement_id: String,
    /// Requirement title
    pub requirement_name: String,
    /// Relative importance used in the overall score
    pub weight: f64,
    /// Best level reached
    pub level: CoverageLevel,
    /// Highest mapping confidence reached
    pub confidence: f64,
    /// Natural keys of evidencing records, in first-seen order
    pub evidence: Vec<String>,
}

/// Coverage across every requirement in the lookup table
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CoverageSummary {
    /// Weighted score in [0, 1]
    pub overall_score: f64,
    /// Requirements with partial or full coverage
    pub requirements_covered: usize,
    /// Requirements in the table
    pub requirements_total: usize,
    /// Per-requirement detail, in table order
    pub requirements: Vec<RequirementCoverage>,
}

/// A requirement with missing or partial coverage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageGap {
    /// Requirement identifier
    pub requirement_id: String,
    /// Requirement title
    pub requirement_name: String,
    /// What the requirement asks for
    pub description: String,
    /// Level currently reached
    pub level: CoverageLevel,
    /// Categories that would evidence it
    pub required_categories: Vec<String>,
    /// Suggested remediation
    pub remediation: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_strength() {
        assert_eq!(CoverageLevel::from(CoverageStrength::Full), CoverageLevel::Full);
        assert!(CoverageLevel::Full > CoverageLevel::Partial);
        assert!(CoverageLevel::Partial > CoverageLevel::None);
    }
}
