//! Terminal aggregate of an extraction job

use crate::coverage::{CoverageMapping, CoverageSummary};
use crate::record::{
    DerivedObligation, DocumentMetadata, ExtractedRecord, ExtractionException, ResultState,
    SecondaryEntity,
};
use crate::structure::DocumentStructure;
use serde::{Deserialize, Serialize};

/// Ratio of deduplicated records to expected records
///
/// Returns 1.0 when nothing was expected (unknown or zero estimate).
pub fn completeness_rate(deduped: usize, expected: u32) -> f64 {
    if expected == 0 {
        1.0
    } else {
        deduped as f64 / expected as f64
    }
}

/// Counts reported alongside the result
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SummaryCounts {
    /// Records after deduplication
    pub records: usize,
    /// Records operating effectively
    pub effective: usize,
    /// Records with exceptions noted
    pub with_exception: usize,
    /// Records not tested
    pub untested: usize,
    /// Exception entries
    pub exceptions: usize,
    /// Secondary entities
    pub secondary_entities: usize,
    /// Derived obligations
    pub derived_obligations: usize,
    /// Coverage mappings emitted
    pub coverage_mappings: usize,
    /// Chunks planned
    pub chunks_planned: usize,
    /// Chunks that exhausted their retries
    pub chunks_exhausted: usize,
    /// Oracle calls made, retries included
    pub oracle_calls: usize,
    /// Whether the verification pass ran
    pub verification_performed: bool,
    /// Records contributed by the verification pass (before deduplication)
    pub supplemental_records: usize,
}

impl SummaryCounts {
    /// Tally record states into the counts
    pub fn tally_records(&mut self, records: &[ExtractedRecord]) {
        self.records = records.len();
        self.effective = 0;
        self.with_exception = 0;
        self.untested = 0;
        for record in records {
            match record.result_state {
                ResultState::Effective => self.effective += 1,
                ResultState::Exception => self.with_exception += 1,
                ResultState::Untested => self.untested += 1,
            }
        }
    }
}

/// Per-area confidence of the extraction, each in [0, 1]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConfidenceScores {
    /// Structure analysis confidence
    pub structure: f64,
    /// Mean record confidence
    pub records: f64,
    /// Metadata confidence (zero when metadata extraction failed)
    pub metadata: f64,
    /// Auxiliary extraction confidence (zero when it failed)
    pub auxiliary: f64,
    /// Weighted overall health signal
    pub overall: f64,
}

/// Everything one job produced for one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Document reference the result is keyed by
    pub document_ref: String,
    /// Structural pre-analysis
    pub structure: DocumentStructure,
    /// Document metadata
    pub metadata: DocumentMetadata,
    /// Deduplicated records, in first-seen order
    pub records: Vec<ExtractedRecord>,
    /// Exceptions noted
    pub exceptions: Vec<ExtractionException>,
    /// Subcontracted / supporting third parties
    pub secondary_entities: Vec<SecondaryEntity>,
    /// Customer-side obligations
    pub derived_obligations: Vec<DerivedObligation>,
    /// Record-to-requirement mappings
    pub coverage: Vec<CoverageMapping>,
    /// Requirement-level coverage
    pub coverage_summary: CoverageSummary,
    /// Counts
    pub counts: SummaryCounts,
    /// Confidence scores
    pub confidence_scores: ConfidenceScores,
    /// Deduplicated records / expected records (1.0 if expected is zero)
    pub completeness_rate: f64,
    /// Total processing time
    pub processing_time_ms: u64,
}
