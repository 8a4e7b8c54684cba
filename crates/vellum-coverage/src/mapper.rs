//! Record-to-requirement mapping

use crate::config::CoverageConfig;
use crate::table::{requirements_for, Requirement, DORA_REQUIREMENTS};
use regex::Regex;
use std::sync::LazyLock;
use vellum_domain::{CoverageMapping, Criterion, ExtractedRecord, ResultState};

static PREFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Longer codes first so "CC6" is not read as "C" and "PI" not as "P"
    Regex::new(r"(?i)^\s*(CC[1-9]|PI|A|C|P)(?:[\d.\-\s]|$)").expect("prefix pattern is valid")
});

fn prefix_of(text: &str) -> Option<String> {
    PREFIX_PATTERN
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}

/// Category prefix of a record
///
/// Tried in order: the category code, the natural key, then a spelled-out
/// criterion name in the category (security has no single prefix).
///
/// # Examples
///
/// ```
/// use vellum_coverage::category_prefix_of;
///
/// assert_eq!(category_prefix_of("CC6.1", "").as_deref(), Some("CC6"));
/// assert_eq!(category_prefix_of("", "A1.2").as_deref(), Some("A"));
/// assert_eq!(category_prefix_of("Confidentiality", "X-9").as_deref(), Some("C"));
/// assert_eq!(category_prefix_of("Other", "IT-04"), None);
/// ```
pub fn category_prefix_of(category: &str, natural_key: &str) -> Option<String> {
    prefix_of(category)
        .or_else(|| prefix_of(natural_key))
        .or_else(|| match Criterion::parse(category)? {
            Criterion::Security => None,
            Criterion::Availability => Some("A".to_string()),
            Criterion::ProcessingIntegrity => Some("PI".to_string()),
            Criterion::Confidentiality => Some("C".to_string()),
            Criterion::Privacy => Some("P".to_string()),
        })
}

/// Category prefix of an extracted record
pub fn category_prefix(record: &ExtractedRecord) -> Option<String> {
    category_prefix_of(&record.category, &record.natural_key)
}

/// Maps deduplicated records onto regulatory requirements
#[derive(Debug, Clone)]
pub struct CoverageMapper {
    config: CoverageConfig,
    table: &'static [Requirement],
}

impl CoverageMapper {
    /// Mapper over the DORA table
    pub fn new(config: CoverageConfig) -> Self {
        Self::with_table(config, DORA_REQUIREMENTS)
    }

    /// Mapper over a custom table
    pub fn with_table(config: CoverageConfig, table: &'static [Requirement]) -> Self {
        Self { config, table }
    }

    /// Requirement table in use
    pub fn table(&self) -> &'static [Requirement] {
        self.table
    }

    /// One mapping per (record, associated requirement)
    ///
    /// Records with no recognizable prefix, or a prefix absent from the
    /// table, produce nothing.
    pub fn map(&self, records: &[ExtractedRecord]) -> Vec<CoverageMapping> {
        let mut mappings = Vec::new();
        for record in records {
            let Some(prefix) = category_prefix(record) else {
                continue;
            };
            for requirement in requirements_for(self.table, &prefix) {
                mappings.push(self.mapping(record, &prefix, requirement));
            }
        }
        tracing::debug!(records = records.len(), mappings = mappings.len(), "Mapped coverage");
        mappings
    }

    fn mapping(&self, record: &ExtractedRecord, prefix: &str, requirement: &Requirement) -> CoverageMapping {
        let strength = requirement.strength();
        let mut note = format!(
            "{} ({}) {} evidences {}: {}",
            record.natural_key,
            prefix,
            strength.as_str(),
            requirement.id,
            requirement.title
        );

        let confidence = if record.result_state == ResultState::Effective {
            record.confidence
        } else {
            let reason = match record.result_state {
                ResultState::Exception => "exception noted during testing",
                _ => "control not tested",
            };
            note.push_str(&format!(
                "; confidence discounted x{}: {}",
                self.config.non_effective_discount, reason
            ));
            record.confidence * self.config.non_effective_discount
        };

        CoverageMapping {
            source_natural_key: record.natural_key.clone(),
            source_area: record.area.clone(),
            target_requirement_id: requirement.id.to_string(),
            target_requirement_name: requirement.title.to_string(),
            strength,
            note,
            confidence,
        }
    }
}

impl Default for CoverageMapper {
    fn default() -> Self {
        Self::new(CoverageConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_domain::{CoverageStrength, Provenance};

    fn record(key: &str, category: &str, state: ResultState, confidence: f64) -> ExtractedRecord {
        ExtractedRecord {
            natural_key: key.to_string(),
            area: "Logical Access".to_string(),
            category: category.to_string(),
            description: "desc".to_string(),
            result_state: state,
            procedure_note: None,
            location: None,
            confidence,
            provenance: Provenance::Verification,
        }
    }

    #[test]
    fn test_prefix_ordering() {
        assert_eq!(category_prefix_of("CC1.2", "").as_deref(), Some("CC1"));
        assert_eq!(category_prefix_of("PI1.1", "").as_deref(), Some("PI"));
        assert_eq!(category_prefix_of("p 4.2", "").as_deref(), Some("P"));
        assert_eq!(category_prefix_of("C", "").as_deref(), Some("C"));
        assert_eq!(category_prefix_of("Change management", ""), None);
    }

    #[test]
    fn test_exception_discount() {
        let mapper = CoverageMapper::default();
        let mappings = mapper.map(&[record("CC9.2", "CC9", ResultState::Exception, 0.9)]);

        assert!(!mappings.is_empty());
        for m in &mappings {
            assert!((m.confidence - 0.9 * 0.7).abs() < 1e-12);
            assert!(m.note.contains("exception"));
        }
    }

    #[test]
    fn test_effective_not_discounted() {
        let mapper = CoverageMapper::default();
        let mappings = mapper.map(&[record("CC6.1", "CC6", ResultState::Effective, 0.95)]);

        let ids: Vec<_> = mappings.iter().map(|m| m.target_requirement_id.as_str()).collect();
        assert_eq!(ids, vec!["Article 6", "Article 7", "Article 8"]);
        assert!(mappings.iter().all(|m| m.confidence == 0.95));
        assert!(mappings.iter().all(|m| !m.note.contains("discounted")));
        assert_eq!(mappings[1].strength, CoverageStrength::Partial);
        assert_eq!(mappings[0].strength, CoverageStrength::Full);
    }

    #[test]
    fn test_untested_discount_reason() {
        let mapper = CoverageMapper::default();
        let mappings = mapper.map(&[record("A1.1", "", ResultState::Untested, 1.0)]);
        assert!(mappings.iter().all(|m| m.note.contains("not tested")));
        assert!(mappings.iter().all(|m| (m.confidence - 0.7).abs() < 1e-12));
    }

    #[test]
    fn test_unmatched_category_is_silent() {
        let mapper = CoverageMapper::default();
        assert!(mapper.map(&[record("IT-7", "Other", ResultState::Effective, 0.9)]).is_empty());
        // Known prefix, no requirement in the table
        assert!(mapper.map(&[record("PI1.3", "PI1", ResultState::Effective, 0.9)]).is_empty());
    }
}
