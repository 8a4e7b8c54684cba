//! Vellum Domain Layer
//!
//! Core data model for multi-pass extraction of audit reports. This crate
//! holds no I/O: it defines the entities produced by an extraction job, the
//! job lifecycle, and the trait seams through which the extractor talks to
//! its external collaborators.
//!
//! ## Key Concepts
//!
//! - **DocumentStructure**: the cheap pre-analysis of a report, including the
//!   extraction plan (expected records per page range)
//! - **ExtractionChunk**: a bounded page range handed to one oracle call
//! - **ExtractedRecord**: one control/finding, keyed by its natural key
//! - **CoverageMapping**: derived link from a record to a regulatory requirement
//! - **JobStatus**: the coarse lifecycle pushed to the job tracker
//!
//! ## Architecture
//!
//! - Pure data and state transitions only
//! - Infrastructure (oracle clients, SQLite) lives in other crates
//! - Trait definitions for every external interaction live in [`traits`]

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod coverage;
pub mod document;
pub mod job;
pub mod record;
pub mod result;
pub mod structure;
pub mod traits;

// Re-exports for convenience
pub use coverage::{
    CoverageGap, CoverageLevel, CoverageMapping, CoverageStrength, CoverageSummary,
    RequirementCoverage,
};
pub use document::Document;
pub use job::{JobHandle, JobProgress, JobStatus};
pub use record::{
    DerivedObligation, DocumentMetadata, ExtractedRecord, ExtractionException, Opinion,
    Provenance, ResultState, SecondaryEntity, Severity,
};
pub use result::{completeness_rate, ConfidenceScores, ExtractionResult, SummaryCounts};
pub use structure::{
    Criterion, DocumentStructure, ExtractionChunk, ExtractionPlan, PageRange, PlannedRange,
    ReportKind, CONTROLS_SECTION,
};
