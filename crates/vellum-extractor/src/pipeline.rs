//! End-to-end extraction job

use crate::analyzer::StructureAnalyzer;
use crate::auxiliary::AuxiliaryExtractor;
use crate::client::OracleClient;
use crate::config::ExtractorConfig;
use crate::dedupe::{dedupe, distinct_keys};
use crate::error::ExtractorError;
use crate::orchestrator::{ChunkReport, ExtractionOrchestrator};
use crate::planner;
use crate::reporter::JobReporter;
use crate::retry::RetryPolicy;
use crate::verification::{should_verify, Verifier};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use vellum_coverage::CoverageMapper;
use vellum_domain::traits::{DocumentOracle, JobTracker, ResultSink};
use vellum_domain::{
    completeness_rate, ConfidenceScores, Document, ExtractedRecord, ExtractionResult, JobHandle,
    JobProgress, JobStatus, SummaryCounts,
};
use vellum_oracle::ErrorClassifier;

const PCT_ANALYZING: u8 = 5;
const PCT_EXTRACTING: u8 = 15;
const PCT_CHUNKS_DONE: u8 = 70;
const PCT_METADATA: u8 = 72;
const PCT_AUXILIARY: u8 = 76;
const PCT_VERIFYING: u8 = 80;
const PCT_MAPPING: u8 = 90;

/// A job that ran to completion and was stored
#[derive(Debug, Clone)]
pub struct JobRun {
    /// Job handle from the tracker
    pub handle: JobHandle,
    /// Reference of the stored result
    pub result_ref: String,
    /// The result itself
    pub result: ExtractionResult,
}

/// Multi-pass extraction of one document
///
/// Phases run in order: structure analysis, chunk planning, chunked
/// extraction, metadata and auxiliary extraction, optional verification,
/// deduplication and coverage mapping.
pub struct Pipeline<O> {
    config: ExtractorConfig,
    client: OracleClient<O>,
    analyzer: StructureAnalyzer<O>,
    orchestrator: ExtractionOrchestrator<O>,
    auxiliary: AuxiliaryExtractor<O>,
    verifier: Verifier<O>,
    mapper: CoverageMapper,
}

impl<O> Pipeline<O>
where
    O: DocumentOracle + Send + Sync + 'static,
{
    /// Create a pipeline, validating the configuration
    pub fn new(oracle: O, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        Self::from_arc(Arc::new(oracle), config)
    }

    /// Create a pipeline around a shared oracle
    pub fn from_arc(oracle: Arc<O>, config: ExtractorConfig) -> Result<Self, ExtractorError> {
        config.validate().map_err(ExtractorError::Config)?;
        let client = OracleClient::from_arc(oracle);

        Ok(Self {
            analyzer: StructureAnalyzer::new(client.clone(), config.analysis_max_output_tokens),
            orchestrator: ExtractionOrchestrator::new(
                client.clone(),
                RetryPolicy::from_config(&config),
                config.pacing_delay(),
                config.max_output_tokens,
            ),
            auxiliary: AuxiliaryExtractor::new(client.clone(), config.max_output_tokens),
            verifier: Verifier::new(client.clone(), config.max_output_tokens),
            mapper: CoverageMapper::new(config.coverage.clone()),
            client,
            config,
        })
    }

    /// Replace the error classifier used for chunk retries
    pub fn with_classifier(mut self, classifier: Box<dyn ErrorClassifier>) -> Self {
        self.orchestrator = self.orchestrator.with_classifier(classifier);
        self
    }

    /// Active configuration
    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Oracle calls made by this pipeline so far
    pub fn oracle_calls(&self) -> usize {
        self.client.calls()
    }

    async fn pace(&self) {
        let pacing = self.config.pacing_delay();
        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }
    }

    /// Run every phase and return the in-memory result
    ///
    /// Progress goes to `reporter`; a structural failure is reported as a
    /// failed job before the error is returned. The job is left in the
    /// mapping state for the caller to complete.
    pub async fn process<T: JobTracker>(
        &self,
        document: &Document,
        reporter: &mut JobReporter<'_, T>,
    ) -> Result<ExtractionResult, ExtractorError> {
        match self.process_inner(document, reporter).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!(document = %document.reference, error = %e, "Extraction failed");
                reporter.fail(&e.to_string());
                Err(e)
            }
        }
    }

    async fn process_inner<T: JobTracker>(
        &self,
        document: &Document,
        reporter: &mut JobReporter<'_, T>,
    ) -> Result<ExtractionResult, ExtractorError> {
        let started = Instant::now();
        let calls_before = self.client.calls();
        info!(document = %document.reference, "Starting extraction");

        // Structure
        reporter.progress(
            JobProgress::new(JobStatus::Analyzing, PCT_ANALYZING, "analyzing")
                .with_message("Analyzing document structure"),
        );
        let structure = self.analyzer.analyze(document).await?;
        let expected = structure.extraction_plan.total_expected_records;

        // Chunks
        let chunks = planner::plan(
            &structure,
            self.config.max_pages_per_chunk,
            self.config.fallback_records_per_chunk,
        );
        if chunks.is_empty() {
            warn!(document = %document.reference, "No extraction plan and no controls section; nothing to extract");
        }
        let total_chunks = chunks.len();
        let mut started_extracting = JobProgress::new(JobStatus::Extracting, PCT_EXTRACTING, "extracting")
            .with_message(format!("Extracting {} chunks", total_chunks));
        started_extracting.chunks_total = total_chunks;
        started_extracting.records_expected = expected;
        reporter.progress(started_extracting);

        let chunked = self
            .orchestrator
            .extract(document, &chunks, |report: &ChunkReport, records_so_far| {
                let done = report.index + 1;
                let span = (PCT_CHUNKS_DONE - PCT_EXTRACTING) as usize;
                let pct = PCT_EXTRACTING as usize + span * done / total_chunks.max(1);
                let mut progress = JobProgress::new(JobStatus::Extracting, pct as u8, "extracting")
                    .with_message(format!("Chunk {}/{} (pages {})", done, total_chunks, report.pages));
                progress.chunks_completed = done;
                progress.chunks_total = total_chunks;
                progress.records_extracted = records_so_far;
                progress.records_expected = expected;
                reporter.progress(progress);
            })
            .await;
        let chunks_exhausted = chunked.exhausted();
        let mut records = chunked.records;
        let exceptions = chunked.exceptions;

        // Metadata and auxiliary
        self.pace().await;
        reporter.progress(JobProgress::new(JobStatus::Extracting, PCT_METADATA, "metadata"));
        let metadata = self.auxiliary.metadata(document).await;
        self.pace().await;
        reporter.progress(JobProgress::new(JobStatus::Extracting, PCT_AUXILIARY, "auxiliary"));
        let auxiliary = self.auxiliary.auxiliary(document).await;

        // Verification
        let before_verification = completeness_rate(distinct_keys(&records), expected);
        info!(
            completeness = before_verification,
            records = records.len(),
            expected,
            "Chunked extraction completeness"
        );
        let mut verification_performed = false;
        let mut supplemental_records = 0;
        if should_verify(before_verification, expected, &self.config) {
            self.pace().await;
            reporter.progress(
                JobProgress::new(JobStatus::Verifying, PCT_VERIFYING, "verifying")
                    .with_message(format!("Completeness {:.0}%, verifying", before_verification * 100.0)),
            );
            verification_performed = true;
            match self.verifier.verify(document, &records, expected).await {
                Ok(extra) => {
                    supplemental_records = extra.len();
                    records.extend(extra);
                }
                Err(e) => warn!(error = %e, "{}", e),
            }
        }

        // Dedupe and coverage
        reporter.progress(JobProgress::new(JobStatus::Mapping, PCT_MAPPING, "mapping"));
        let records = dedupe(records);
        let coverage = self.mapper.map(&records);
        let coverage_summary = self.mapper.summarize(&coverage);
        let completeness = completeness_rate(records.len(), expected);

        let mut counts = SummaryCounts {
            exceptions: exceptions.len(),
            secondary_entities: auxiliary.secondary_entities.len(),
            derived_obligations: auxiliary.derived_obligations.len(),
            coverage_mappings: coverage.len(),
            chunks_planned: total_chunks,
            chunks_exhausted,
            oracle_calls: self.client.calls() - calls_before,
            verification_performed,
            supplemental_records,
            ..Default::default()
        };
        counts.tally_records(&records);

        let confidence_scores = confidence_scores(
            structure.analysis_confidence,
            &records,
            metadata.confidence,
            auxiliary.confidence,
            completeness,
        );

        info!(
            document = %document.reference,
            records = records.len(),
            expected,
            completeness,
            chunks_exhausted,
            oracle_calls = counts.oracle_calls,
            coverage = coverage_summary.overall_score,
            "Extraction complete"
        );

        Ok(ExtractionResult {
            document_ref: document.reference.clone(),
            structure,
            metadata,
            records,
            exceptions,
            secondary_entities: auxiliary.secondary_entities,
            derived_obligations: auxiliary.derived_obligations,
            coverage,
            coverage_summary,
            counts,
            confidence_scores,
            completeness_rate: completeness,
            processing_time_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Run a tracked job: create it, process, store the result, complete it
    ///
    /// A second job for a document with an active job is rejected. If the
    /// result cannot be stored the job is failed and the error carries the
    /// unsaved result.
    pub async fn run<B>(&self, document: &Document, backend: &mut B) -> Result<JobRun, ExtractorError>
    where
        B: JobTracker + ResultSink,
    {
        let handle = match JobTracker::create_job(backend, &document.reference) {
            Ok(Some(handle)) => handle,
            Ok(None) => return Err(ExtractorError::JobAlreadyActive(document.reference.clone())),
            Err(e) => return Err(ExtractorError::Tracker(e.to_string())),
        };
        info!(job = %handle, document = %document.reference, "Created extraction job");

        let (result, status) = {
            let mut reporter = JobReporter::attached(backend, handle);
            let result = self.process(document, &mut reporter).await?;
            (result, reporter.status())
        };

        match backend.upsert_result(&result) {
            Ok(result_ref) => {
                JobReporter::resume(backend, handle, status).complete(&result_ref);
                Ok(JobRun {
                    handle,
                    result_ref,
                    result,
                })
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(job = %handle, error = %message, "Failed to store result");
                JobReporter::resume(backend, handle, status).fail(&format!("Persistence failed: {}", message));
                Err(ExtractorError::PersistenceFailed {
                    message,
                    result: Box::new(result),
                })
            }
        }
    }
}

/// Per-area and overall confidence
///
/// `overall = 0.6 * records * min(completeness, 1) + 0.2 * structure
/// + 0.1 * metadata + 0.1 * auxiliary`.
pub fn confidence_scores(
    structure: f64,
    records: &[ExtractedRecord],
    metadata: f64,
    auxiliary: f64,
    completeness: f64,
) -> ConfidenceScores {
    let mean = if records.is_empty() {
        0.0
    } else {
        records.iter().map(|r| r.confidence).sum::<f64>() / records.len() as f64
    };
    let overall = 0.6 * mean * completeness.min(1.0) + 0.2 * structure + 0.1 * metadata + 0.1 * auxiliary;

    ConfidenceScores {
        structure,
        records: mean,
        metadata,
        auxiliary,
        overall: overall.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_domain::{Provenance, ResultState};

    fn record(confidence: f64) -> ExtractedRecord {
        ExtractedRecord {
            natural_key: "CC1.1".to_string(),
            area: String::new(),
            category: "CC1".to_string(),
            description: String::new(),
            result_state: ResultState::Effective,
            procedure_note: None,
            location: None,
            confidence,
            provenance: Provenance::Verification,
        }
    }

    #[test]
    fn test_overall_confidence_weights() {
        let scores = confidence_scores(0.5, &[record(0.8), record(1.0)], 1.0, 0.0, 0.5);
        assert!((scores.records - 0.9).abs() < 1e-9);
        // 0.6 * 0.9 * 0.5 + 0.2 * 0.5 + 0.1
        assert!((scores.overall - 0.47).abs() < 1e-9);
    }

    #[test]
    fn test_completeness_above_one_not_rewarded() {
        let capped = confidence_scores(1.0, &[record(1.0)], 1.0, 1.0, 1.4);
        assert!((capped.overall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_records_zero_mean() {
        let scores = confidence_scores(0.9, &[], 0.0, 0.0, 1.0);
        assert_eq!(scores.records, 0.0);
        assert!((scores.overall - 0.18).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ExtractorConfig {
            max_pages_per_chunk: 0,
            ..ExtractorConfig::without_delays()
        };
        let err = Pipeline::new(vellum_oracle::MockOracle::default(), config).err();
        assert!(matches!(err, Some(ExtractorError::Config(_))));
    }
}
