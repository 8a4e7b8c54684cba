//! Extracted records and the enrichment entities gathered alongside them

use crate::structure::{Criterion, PageRange, ReportKind};
use serde::{Deserialize, Serialize};

/// Outcome the auditor reported for a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultState {
    /// Operating effectively, no exceptions noted
    Effective,
    /// Exception or deviation noted
    Exception,
    /// Not tested or not applicable
    Untested,
}

impl ResultState {
    /// Get the state name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultState::Effective => "effective",
            ResultState::Exception => "exception",
            ResultState::Untested => "untested",
        }
    }

    /// Parse from the phrasing oracles and auditors tend to use
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase().replace([' ', '-'], "_");
        match s.as_str() {
            "effective" | "operating_effectively" | "no_exceptions" | "no_exceptions_noted"
            | "passed" => Some(ResultState::Effective),
            "exception" | "exceptions" | "exception_noted" | "deviation" | "qualified" => {
                Some(ResultState::Exception)
            }
            "untested" | "not_tested" | "not_applicable" | "n/a" | "na" => {
                Some(ResultState::Untested)
            }
            _ => None,
        }
    }
}

/// Which extraction call produced a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
    /// Returned by a chunked extraction call
    Chunk {
        /// Chunk index
        index: usize,
        /// Pages the chunk covered
        pages: PageRange,
        /// Categories the chunk was asked for
        categories: Vec<String>,
    },
    /// Returned by the completeness-verification pass
    Verification,
}

/// One control/finding extracted from the document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    /// Externally visible identifier (e.g. "CC6.1"); the deduplication key
    pub natural_key: String,
    /// Control area (e.g. "Logical and Physical Access")
    pub area: String,
    /// Category code (e.g. "CC6")
    pub category: String,
    /// Full control description
    pub description: String,
    /// Reported test outcome
    pub result_state: ResultState,
    /// Auditor's test procedure, if given
    pub procedure_note: Option<String>,
    /// Page where the record appears
    pub location: Option<u32>,
    /// Extraction confidence [0, 1]
    pub confidence: f64,
    /// Call that returned this record
    pub provenance: Provenance,
}

/// Severity of an exception
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Low
    Low,
    /// Medium (default when the report gives no signal)
    #[default]
    Medium,
    /// High
    High,
}

impl Severity {
    /// Parse a severity, defaulting to `Medium`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "low" | "minor" => Severity::Low,
            "high" | "critical" | "major" | "significant" => Severity::High,
            _ => Severity::Medium,
        }
    }
}

/// An exception or deviation noted in the report
///
/// Free-standing: need not reference a record present in the record set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionException {
    /// Natural key of the control the exception concerns
    pub natural_key: String,
    /// What the auditor found
    pub description: String,
    /// Exception classification, if the report gives one
    pub classification: Option<String>,
    /// Management response / remediation plan
    pub remediation_note: Option<String>,
    /// Remediation date (ISO 8601 date as reported)
    pub remediation_date: Option<String>,
    /// Whether the auditor verified remediation
    pub remediation_verified: Option<bool>,
    /// Severity
    pub severity: Severity,
    /// Page reference
    pub location: Option<u32>,
}

/// A subcontracted or supporting third party named in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryEntity {
    /// Organization name
    pub name: String,
    /// Services provided
    pub service: String,
    /// Whether the entity is carved out of scope
    pub carved_out: bool,
    /// Page reference
    pub location: Option<u32>,
}

/// A customer-side obligation the report relies on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedObligation {
    /// Identifier, if the report numbers them
    pub id: Option<String>,
    /// Obligation text
    pub description: String,
    /// What the customer must do
    pub responsibility: String,
    /// Related record natural key
    pub related_key: Option<String>,
    /// Page reference
    pub location: Option<u32>,
}

/// Auditor's overall opinion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Opinion {
    /// Clean opinion
    Unqualified,
    /// Qualified opinion
    Qualified,
    /// Adverse opinion
    Adverse,
    /// Disclaimer of opinion
    Disclaimer,
    /// Not determinable
    #[default]
    Unknown,
}

impl Opinion {
    /// Parse an opinion, defaulting to `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "unqualified" | "unmodified" | "clean" => Opinion::Unqualified,
            "qualified" | "modified" => Opinion::Qualified,
            "adverse" => Opinion::Adverse,
            "disclaimer" | "disclaimed" => Opinion::Disclaimer,
            _ => Opinion::Unknown,
        }
    }
}

/// Document-level metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Issuing firm
    pub issuer: Option<String>,
    /// Organization the report covers
    pub subject_org: Option<String>,
    /// Report kind
    pub report_kind: ReportKind,
    /// Opinion-like classification
    pub opinion: Opinion,
    /// Period start (ISO 8601 date as reported)
    pub period_start: Option<String>,
    /// Period end (ISO 8601 date as reported)
    pub period_end: Option<String>,
    /// Criteria in scope
    pub criteria: Vec<Criterion>,
    /// Short description of the system under audit
    pub system_description: Option<String>,
    /// Confidence in this metadata [0, 1]; zero when extraction failed
    pub confidence: f64,
}

impl DocumentMetadata {
    /// A fresh empty value, used when metadata extraction fails
    pub fn empty() -> Self {
        Self {
            issuer: None,
            subject_org: None,
            report_kind: ReportKind::Unknown,
            opinion: Opinion::Unknown,
            period_start: None,
            period_end: None,
            criteria: Vec::new(),
            system_description: None,
            confidence: 0.0,
        }
    }

    /// Whether nothing was extracted
    pub fn is_empty(&self) -> bool {
        self.issuer.is_none()
            && self.subject_org.is_none()
            && self.report_kind == ReportKind::Unknown
            && self.period_start.is_none()
            && self.period_end.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_state_parse_variants() {
        assert_eq!(ResultState::parse("operating_effectively"), Some(ResultState::Effective));
        assert_eq!(ResultState::parse("Operating effectively"), Some(ResultState::Effective));
        assert_eq!(ResultState::parse("Exception noted"), Some(ResultState::Exception));
        assert_eq!(ResultState::parse("not tested"), Some(ResultState::Untested));
        assert_eq!(ResultState::parse("maybe"), None);
    }

    #[test]
    fn test_empty_metadata_is_fresh() {
        let mut first = DocumentMetadata::empty();
        first.criteria.push(Criterion::Privacy);
        let second = DocumentMetadata::empty();
        assert!(second.criteria.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn test_provenance_serializes_with_tag() {
        let json = serde_json::to_value(Provenance::Verification).unwrap();
        assert_eq!(json["kind"], "verification");
    }

    #[test]
    fn test_severity_defaults_to_medium() {
        assert_eq!(Severity::parse("critical"), Severity::High);
        assert_eq!(Severity::parse(""), Severity::Medium);
    }
}
