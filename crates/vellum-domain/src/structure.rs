//! Document structure and extraction planning

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Section name under which the controls/testing matrix is reported
pub const CONTROLS_SECTION: &str = "controls";

/// Inclusive, 1-based page range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageRange {
    /// First page (inclusive)
    pub start: u32,
    /// Last page (inclusive)
    pub end: u32,
}

impl PageRange {
    /// Create a page range
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Number of pages covered; zero for an inverted range
    pub fn width(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Check if the range contains a page
    pub fn contains(&self, page: u32) -> bool {
        page >= self.start && page <= self.end
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Kind of attestation report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportKind {
    /// Point-in-time design assessment
    Type1,
    /// Design plus operating effectiveness over a period
    Type2,
    /// Not determinable from the document
    #[default]
    Unknown,
}

impl ReportKind {
    /// Get the report kind as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Type1 => "type1",
            ReportKind::Type2 => "type2",
            ReportKind::Unknown => "unknown",
        }
    }

    /// Parse leniently: "Type 2", "type_2", "TYPE II" all map to `Type2`
    pub fn parse(s: &str) -> Self {
        let normalized: String = s
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        match normalized.as_str() {
            "type1" | "typei" | "1" => ReportKind::Type1,
            "type2" | "typeii" | "2" => ReportKind::Type2,
            _ => ReportKind::Unknown,
        }
    }
}

/// Trust services criterion a report can cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Common criteria (always in scope)
    Security,
    /// Availability
    Availability,
    /// Processing integrity
    ProcessingIntegrity,
    /// Confidentiality
    Confidentiality,
    /// Privacy
    Privacy,
}

impl Criterion {
    /// Get the criterion name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Criterion::Security => "security",
            Criterion::Availability => "availability",
            Criterion::ProcessingIntegrity => "processing_integrity",
            Criterion::Confidentiality => "confidentiality",
            Criterion::Privacy => "privacy",
        }
    }

    /// Parse a criterion from free text
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "security" | "common_criteria" | "cc" => Some(Criterion::Security),
            "availability" | "a" => Some(Criterion::Availability),
            "processing_integrity" | "pi" => Some(Criterion::ProcessingIntegrity),
            "confidentiality" | "c" => Some(Criterion::Confidentiality),
            "privacy" | "p" => Some(Criterion::Privacy),
            _ => None,
        }
    }
}

impl std::str::FromStr for Criterion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid criterion: {}", s))
    }
}

/// One page range of the extraction plan, as reported by the structure analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedRange {
    /// First page (inclusive)
    pub start_page: u32,
    /// Last page (inclusive)
    pub end_page: u32,
    /// Advisory record count; never used to fail extraction
    pub expected_records: u32,
    /// Record categories expected in this range
    pub categories: Vec<String>,
}

impl PlannedRange {
    /// Page range covered
    pub fn pages(&self) -> PageRange {
        PageRange::new(self.start_page, self.end_page)
    }
}

/// How the document should be split for extraction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionPlan {
    /// Total records the analysis expects across the document
    pub total_expected_records: u32,
    /// Ordered, non-overlapping ranges, front-to-back
    pub page_ranges: Vec<PlannedRange>,
}

/// Cheap structural pre-analysis of a document
///
/// Produced once per document; immutable thereafter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStructure {
    /// Total page count reported by the analysis (0 if unknown)
    pub total_pages: u32,
    /// Report kind
    pub report_kind: ReportKind,
    /// Issuing firm
    pub issuer: Option<String>,
    /// Organization the report is about
    pub subject_org: Option<String>,
    /// Criteria in scope; governs which coverage categories are expected
    pub criteria_in_scope: BTreeSet<Criterion>,
    /// Section boundaries, `None` when a section is known to exist but unlocated
    pub sections: BTreeMap<String, Option<PageRange>>,
    /// Extraction plan
    pub extraction_plan: ExtractionPlan,
    /// Oracle's confidence in this analysis [0, 1]
    pub analysis_confidence: f64,
    /// Wall-clock duration of the analysis call
    pub analysis_duration_ms: u64,
}

impl DocumentStructure {
    /// Page range of the controls section, if located
    pub fn controls_section(&self) -> Option<PageRange> {
        self.sections.get(CONTROLS_SECTION).copied().flatten()
    }
}

/// A bounded page-range extraction unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionChunk {
    /// Position in document order, starting at 0
    pub index: usize,
    /// First page (inclusive)
    pub start_page: u32,
    /// Last page (inclusive)
    pub end_page: u32,
    /// Advisory record count (hint for the oracle and progress only)
    pub expected_records: u32,
    /// Categories expected in this chunk
    pub categories: Vec<String>,
}

impl ExtractionChunk {
    /// Page range covered
    pub fn pages(&self) -> PageRange {
        PageRange::new(self.start_page, self.end_page)
    }

    /// Number of pages covered
    pub fn width(&self) -> u32 {
        self.pages().width()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_width() {
        assert_eq!(PageRange::new(10, 17).width(), 8);
        assert_eq!(PageRange::new(5, 5).width(), 1);
        assert_eq!(PageRange::new(9, 4).width(), 0);
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!(ReportKind::parse("Type 2"), ReportKind::Type2);
        assert_eq!(ReportKind::parse("TYPE II"), ReportKind::Type2);
        assert_eq!(ReportKind::parse("type1"), ReportKind::Type1);
        assert_eq!(ReportKind::parse("bridge letter"), ReportKind::Unknown);
    }

    #[test]
    fn test_criterion_parse() {
        assert_eq!(Criterion::parse("Processing Integrity"), Some(Criterion::ProcessingIntegrity));
        assert_eq!(Criterion::parse("privacy"), Some(Criterion::Privacy));
        assert!("nonsense".parse::<Criterion>().is_err());
    }

    #[test]
    fn test_controls_section_lookup() {
        let mut sections = BTreeMap::new();
        sections.insert("opinion".to_string(), Some(PageRange::new(1, 3)));
        sections.insert(CONTROLS_SECTION.to_string(), Some(PageRange::new(20, 60)));
        let structure = DocumentStructure {
            total_pages: 80,
            report_kind: ReportKind::Type2,
            issuer: None,
            subject_org: None,
            criteria_in_scope: BTreeSet::new(),
            sections,
            extraction_plan: ExtractionPlan::default(),
            analysis_confidence: 0.8,
            analysis_duration_ms: 0,
        };
        assert_eq!(structure.controls_section(), Some(PageRange::new(20, 60)));
    }
}
