//! Source document handed to an extraction job

use std::sync::Arc;

/// A document to extract from: an opaque payload plus the caller's reference
///
/// The payload is shared, not copied, across the many oracle calls of a job.
#[derive(Debug, Clone)]
pub struct Document {
    /// External reference (document id in the record store)
    pub reference: String,

    /// Raw document bytes (typically a PDF)
    pub payload: Arc<[u8]>,
}

impl Document {
    /// Create a document from a reference and its bytes
    pub fn new(reference: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            reference: reference.into(),
            payload: Arc::from(payload.into()),
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
