//! Vellum Coverage
//!
//! Maps extracted audit records onto regulatory requirements through a
//! static lookup table.
//!
//! The mapper provides:
//! - Category prefix detection (`CC6.1` → `CC6`)
//! - One mapping per associated requirement, discounted when the control
//!   was not operating effectively
//! - Requirement-level summary and gap analysis
//!
//! # Examples
//!
//! ```
//! use vellum_coverage::{CoverageConfig, CoverageMapper};
//!
//! let mapper = CoverageMapper::new(CoverageConfig::default());
//! let mappings = mapper.map(&[]);
//! let summary = mapper.summarize(&mappings);
//! assert_eq!(summary.requirements_covered, 0);
//! ```

#![warn(missing_docs)]

mod config;
mod mapper;
mod summary;
pub mod table;

pub use config::CoverageConfig;
pub use mapper::{category_prefix, category_prefix_of, CoverageMapper};
pub use summary::{gaps, summarize};
pub use table::{Requirement, DORA_REQUIREMENTS};

use vellum_domain::{CoverageGap, CoverageMapping, CoverageSummary};

impl CoverageMapper {
    /// Requirement-level summary over this mapper's table
    pub fn summarize(&self, mappings: &[CoverageMapping]) -> CoverageSummary {
        summarize(self.table(), mappings)
    }

    /// Gaps over this mapper's table
    pub fn gaps(&self, summary: &CoverageSummary) -> Vec<CoverageGap> {
        gaps(self.table(), summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use vellum_domain::{ExtractedRecord, Provenance, ResultState};

    fn state() -> impl Strategy<Value = ResultState> {
        prop_oneof![
            Just(ResultState::Effective),
            Just(ResultState::Exception),
            Just(ResultState::Untested),
        ]
    }

    proptest! {
        #[test]
        fn mapping_confidence_never_exceeds_record(
            category in "(CC[1-9]|A|C|P|PI|X)[0-9]\\.[0-9]",
            confidence in 0.0f64..=1.0,
            result_state in state(),
        ) {
            let record = ExtractedRecord {
                natural_key: category.clone(),
                area: String::new(),
                category,
                description: String::new(),
                result_state,
                procedure_note: None,
                location: None,
                confidence,
                provenance: Provenance::Verification,
            };
            let mapper = CoverageMapper::default();
            for m in mapper.map(std::slice::from_ref(&record)) {
                prop_assert!(m.confidence <= record.confidence);
                if result_state == ResultState::Effective {
                    prop_assert_eq!(m.confidence, record.confidence);
                }
            }
        }
    }

    #[test]
    fn test_summary_through_mapper() {
        let record = ExtractedRecord {
            natural_key: "CC9.1".to_string(),
            area: "Risk Mitigation".to_string(),
            category: "CC9".to_string(),
            description: String::new(),
            result_state: ResultState::Effective,
            procedure_note: None,
            location: Some(40),
            confidence: 1.0,
            provenance: Provenance::Verification,
        };
        let mapper = CoverageMapper::default();
        let summary = mapper.summarize(&mapper.map(&[record]));

        assert_eq!(summary.requirements_covered, 6);
        assert!(summary.overall_score > 0.0);
        assert_eq!(mapper.gaps(&summary).len(), DORA_REQUIREMENTS.len() - 5);
    }
}
