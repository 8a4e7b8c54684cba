//! Trait definitions for external interactions
//!
//! These traits define the boundaries between the extraction core and its
//! collaborators. Implementations live in other crates (vellum-oracle,
//! vellum-store).

use crate::document::Document;
use crate::job::{JobHandle, JobProgress};
use crate::result::ExtractionResult;
use std::sync::Arc;

/// A single request to the document-understanding oracle
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Document bytes
    pub payload: Arc<[u8]>,
    /// Natural-language instruction
    pub instruction: String,
    /// Output budget (tokens)
    pub max_output_tokens: u32,
    /// Sampling temperature; always 0 for reproducible evidence
    pub temperature: f32,
}

impl OracleRequest {
    /// Build a deterministic (temperature 0) request for a document
    pub fn new(document: &Document, instruction: impl Into<String>, max_output_tokens: u32) -> Self {
        Self {
            payload: Arc::clone(&document.payload),
            instruction: instruction.into(),
            max_output_tokens,
            temperature: 0.0,
        }
    }
}

/// Trait for the document-understanding oracle
///
/// Implemented by the infrastructure layer (vellum-oracle). Errors are
/// treated as opaque text by the core; any timeout is the implementation's
/// responsibility.
pub trait DocumentOracle {
    /// Error type for oracle operations
    type Error: std::fmt::Display;

    /// Send a document plus instruction, return the raw text answer
    fn invoke(&self, request: &OracleRequest) -> Result<String, Self::Error>;
}

/// Push-only job progress interface
///
/// Implemented by the infrastructure layer (vellum-store). The core never
/// reads job state back.
pub trait JobTracker {
    /// Error type for tracker operations
    type Error: std::fmt::Display;

    /// Create a job for a document; `None` if one is already active for it
    fn create_job(&mut self, document_ref: &str) -> Result<Option<JobHandle>, Self::Error>;

    /// Record partial progress
    fn update_progress(&mut self, handle: JobHandle, progress: &JobProgress) -> Result<(), Self::Error>;

    /// Mark the job complete, pointing at the stored result
    fn complete_job(&mut self, handle: JobHandle, result_ref: &str) -> Result<(), Self::Error>;

    /// Mark the job failed
    fn fail_job(&mut self, handle: JobHandle, message: &str) -> Result<(), Self::Error>;
}

/// Sink for final results
///
/// Upsert semantics: writing twice for one document replaces the earlier
/// result, since documents may be reprocessed.
pub trait ResultSink {
    /// Error type for sink operations
    type Error: std::fmt::Display;

    /// Store a result, returning a reference to the stored row
    fn upsert_result(&mut self, result: &ExtractionResult) -> Result<String, Self::Error>;
}
