//! Sequential chunked extraction with retry and pacing

use crate::client::OracleClient;
use crate::error::ExtractorError;
use crate::parser::{self, Object};
use crate::prompt;
use crate::retry::{with_retry, Attempted, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use vellum_domain::traits::DocumentOracle;
use vellum_domain::{
    Document, ExtractedRecord, ExtractionChunk, ExtractionException, PageRange, Provenance,
};
use vellum_oracle::{ErrorClassifier, SubstringClassifier};

/// What happened to one chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkReport {
    /// Chunk index
    pub index: usize,
    /// Pages covered
    pub pages: PageRange,
    /// Oracle calls made for this chunk
    pub attempts: u32,
    /// Records the chunk contributed
    pub records: usize,
    /// Whether every attempt failed
    pub exhausted: bool,
    /// Last error, when exhausted
    pub error: Option<String>,
}

/// Accumulated output of a chunked extraction
#[derive(Debug, Clone, Default)]
pub struct ChunkedExtraction {
    /// Records from every successful chunk, in chunk order
    pub records: Vec<ExtractedRecord>,
    /// Exceptions from every successful chunk
    pub exceptions: Vec<ExtractionException>,
    /// One report per chunk
    pub reports: Vec<ChunkReport>,
}

impl ChunkedExtraction {
    /// Chunks that contributed nothing because every attempt failed
    pub fn exhausted(&self) -> usize {
        self.reports.iter().filter(|r| r.exhausted).count()
    }

    /// Oracle calls made, retries included
    pub fn attempts(&self) -> u32 {
        self.reports.iter().map(|r| r.attempts).sum()
    }
}

/// Drives the planned chunks through the oracle one at a time
pub struct ExtractionOrchestrator<O> {
    client: OracleClient<O>,
    policy: RetryPolicy,
    classifier: Box<dyn ErrorClassifier>,
    pacing: Duration,
    max_output_tokens: u32,
}

impl<O> ExtractionOrchestrator<O>
where
    O: DocumentOracle + Send + Sync + 'static,
{
    /// Create an orchestrator with the default error classifier
    pub fn new(
        client: OracleClient<O>,
        policy: RetryPolicy,
        pacing: Duration,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            client,
            policy,
            classifier: Box::new(SubstringClassifier::default()),
            pacing,
            max_output_tokens,
        }
    }

    /// Replace the error classifier
    pub fn with_classifier(mut self, classifier: Box<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Extract every chunk in order
    ///
    /// A chunk that fails on every attempt contributes nothing; the run
    /// continues with the next chunk. `on_chunk` is called after each chunk
    /// with its report and the running record count.
    pub async fn extract<F>(
        &self,
        document: &Document,
        chunks: &[ExtractionChunk],
        mut on_chunk: F,
    ) -> ChunkedExtraction
    where
        F: FnMut(&ChunkReport, usize),
    {
        let mut out = ChunkedExtraction::default();
        info!("Extracting {} chunks", chunks.len());

        for (position, chunk) in chunks.iter().enumerate() {
            let pages = chunk.pages();
            debug!(chunk = chunk.index, %pages, expected = chunk.expected_records, "Processing chunk {}/{}", position + 1, chunks.len());

            let attempted = self.call_chunk(document, chunk).await;
            let report = match attempted.outcome {
                Ok(obj) => {
                    let provenance = Provenance::Chunk {
                        index: chunk.index,
                        pages,
                        categories: chunk.categories.clone(),
                    };
                    let records = parser::records(&obj, &chunk.categories, &provenance);
                    let count = records.len();
                    out.records.extend(records);
                    out.exceptions.extend(parser::exceptions(&obj));
                    debug!(chunk = chunk.index, records = count, attempts = attempted.attempts, "Chunk complete");
                    ChunkReport {
                        index: chunk.index,
                        pages,
                        attempts: attempted.attempts,
                        records: count,
                        exhausted: false,
                        error: None,
                    }
                }
                Err(e) => {
                    let exhausted = ExtractorError::ChunkExtractionExhausted {
                        chunk: chunk.index,
                        pages,
                        attempts: attempted.attempts,
                        last_error: e.to_string(),
                    };
                    warn!(
                        chunk = chunk.index,
                        %pages,
                        attempt = attempted.attempts,
                        error = %e,
                        "{}",
                        exhausted
                    );
                    ChunkReport {
                        index: chunk.index,
                        pages,
                        attempts: attempted.attempts,
                        records: 0,
                        exhausted: true,
                        error: Some(e.to_string()),
                    }
                }
            };

            on_chunk(&report, out.records.len());
            out.reports.push(report);

            if position + 1 < chunks.len() && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }
        }

        info!(
            records = out.records.len(),
            exhausted = out.exhausted(),
            calls = out.attempts(),
            "Chunked extraction finished"
        );
        out
    }

    async fn call_chunk(&self, document: &Document, chunk: &ExtractionChunk) -> Attempted<Object> {
        let client = &self.client;
        let instruction = prompt::chunk_instruction(chunk);
        let max_output_tokens = self.max_output_tokens;

        with_retry(&self.policy, self.classifier.as_ref(), move |_| {
            let instruction = instruction.clone();
            async move {
                let text = client.invoke(document, instruction, max_output_tokens).await?;
                parser::parse_object(&text)
            }
        })
        .await
    }
}
