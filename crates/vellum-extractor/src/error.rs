//! Error types for the Extractor

use thiserror::Error;
use vellum_domain::{ExtractionResult, PageRange};

/// Errors that can occur during extraction
///
/// Only `StructuralAnalysisFailed`, `JobAlreadyActive` and glue failures end a
/// job. The chunk, auxiliary and verification variants are logged and
/// absorbed into the completeness rate.
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Structure analysis could not produce a plan; the job aborts
    #[error("Structural analysis failed: {0}")]
    StructuralAnalysisFailed(String),

    /// A chunk failed on every attempt
    #[error("Chunk {chunk} (pages {pages}) exhausted after {attempts} attempts: {last_error}")]
    ChunkExtractionExhausted {
        /// Chunk index
        chunk: usize,
        /// Pages the chunk covered
        pages: PageRange,
        /// Oracle calls made
        attempts: u32,
        /// Last error seen
        last_error: String,
    },

    /// Metadata or auxiliary extraction failed
    #[error("{phase} extraction failed: {reason}")]
    AuxiliaryExtractionFailed {
        /// Which extraction
        phase: &'static str,
        /// Error text
        reason: String,
    },

    /// Verification pass failed
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// The result could not be written; the in-memory result is carried along
    #[error("Persistence failed: {message}")]
    PersistenceFailed {
        /// Error text from the result sink
        message: String,
        /// Result that was not stored
        result: Box<ExtractionResult>,
    },

    /// Another job is active for the same document
    #[error("A job is already active for document '{0}'")]
    JobAlreadyActive(String),

    /// Job tracker could not create a job
    #[error("Job tracker error: {0}")]
    Tracker(String),

    /// Oracle call failed
    #[error("Oracle error: {0}")]
    Oracle(String),

    /// Oracle answered but the payload could not be parsed
    #[error("Payload error: {0}")]
    Payload(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractorError {
    /// Result computed before a persistence failure, if any
    pub fn into_unsaved_result(self) -> Option<ExtractionResult> {
        match self {
            ExtractorError::PersistenceFailed { result, .. } => Some(*result),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::Payload(e.to_string())
    }
}
