//! Vellum Extractor
//!
//! Multi-pass extraction of controls and findings from long audit reports.
//!
//! # Overview
//!
//! A single oracle call over a 100-page report returns a fraction of its
//! controls. The extractor instead spends one cheap call learning the
//! document's layout, then walks the controls section in bounded page
//! ranges, retrying and pacing each call, and finally checks its own
//! completeness against the up-front estimate.
//!
//! # Architecture
//!
//! ```text
//! Document → StructureAnalyzer → planner → ExtractionOrchestrator ─┐
//!                                                                 ├→ Verifier? → dedupe → CoverageMapper → ExtractionResult
//!                       AuxiliaryExtractor (metadata, parties) ───┘
//! ```
//!
//! Only structure analysis and persistence can fail a job. Failed chunks,
//! auxiliary calls and verification are logged and show up as reduced
//! completeness instead.
//!
//! # Example Usage
//!
//! ```no_run
//! use vellum_extractor::{ExtractorConfig, JobReporter, Pipeline};
//! use vellum_domain::Document;
//! use vellum_oracle::MockOracle;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(MockOracle::default(), ExtractorConfig::default())?;
//! let document = Document::new("report-2024", std::fs::read("report.pdf")?);
//!
//! let mut reporter = JobReporter::detached();
//! let result = pipeline.process(&document, &mut reporter).await?;
//!
//! println!("Records: {}", result.records.len());
//! println!("Completeness: {:.0}%", result.completeness_rate * 100.0);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod analyzer;
mod auxiliary;
mod client;
mod config;
mod dedupe;
mod error;
mod orchestrator;
pub mod parser;
mod pipeline;
pub mod planner;
pub mod prompt;
mod reporter;
pub mod retry;
mod verification;


pub use analyzer::{StructureAnalyzer, STRUCTURE_UNPARSABLE};
pub use auxiliary::{Auxiliary, AuxiliaryExtractor};
pub use client::OracleClient;
pub use config::ExtractorConfig;
pub use dedupe::{dedupe, distinct_keys};
pub use error::ExtractorError;
pub use orchestrator::{ChunkReport, ChunkedExtraction, ExtractionOrchestrator};
pub use pipeline::{confidence_scores, JobRun, Pipeline};
pub use reporter::{JobReporter, NullTracker};
pub use retry::{with_retry, Attempted, RetryPolicy};
pub use verification::{should_verify, Verifier};
