//! Structure analysis: one cheap call that plans the rest of the job

use crate::client::OracleClient;
use crate::error::ExtractorError;
use crate::parser;
use crate::prompt;
use std::time::Instant;
use tracing::{debug, info, warn};
use vellum_domain::traits::DocumentOracle;
use vellum_domain::{Document, DocumentStructure};

/// Reason reported when the analysis payload carries no usable structure
pub const STRUCTURE_UNPARSABLE: &str = "structure_unparsable";

/// Runs the structural pre-analysis
///
/// A single call with no retry. Any failure aborts the job, since nothing
/// downstream can be planned without it.
pub struct StructureAnalyzer<O> {
    client: OracleClient<O>,
    max_output_tokens: u32,
}

impl<O> StructureAnalyzer<O>
where
    O: DocumentOracle + Send + Sync + 'static,
{
    /// Create an analyzer sharing `client`
    pub fn new(client: OracleClient<O>, max_output_tokens: u32) -> Self {
        Self {
            client,
            max_output_tokens,
        }
    }

    /// Analyze a document's layout and extraction plan
    pub async fn analyze(&self, document: &Document) -> Result<DocumentStructure, ExtractorError> {
        let started = Instant::now();
        info!(document = %document.reference, bytes = document.len(), "Analyzing document structure");

        let response = self
            .client
            .invoke(document, prompt::structure_instruction(), self.max_output_tokens)
            .await
            .map_err(|e| ExtractorError::StructuralAnalysisFailed(e.to_string()))?;
        debug!("Structure response length: {} chars", response.len());

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let structure = parser::parse_object(&response)
            .map_err(|e| {
                warn!(error = %e, "Structure payload is not a JSON object");
                ExtractorError::StructuralAnalysisFailed(STRUCTURE_UNPARSABLE.to_string())
            })
            .and_then(|obj| {
                parser::structure(&obj, elapsed_ms).map_err(ExtractorError::StructuralAnalysisFailed)
            })?;

        info!(
            total_pages = structure.total_pages,
            report_kind = %structure.report_kind.as_str(),
            expected_records = structure.extraction_plan.total_expected_records,
            ranges = structure.extraction_plan.page_ranges.len(),
            elapsed_ms,
            "Structure analysis complete"
        );
        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_oracle::MockOracle;

    fn analyzer(mock: MockOracle) -> StructureAnalyzer<MockOracle> {
        StructureAnalyzer::new(OracleClient::new(mock), 8192)
    }

    #[tokio::test]
    async fn test_analyze_reads_plan() {
        let mock = MockOracle::new(
            r#"Here you go: {"totalPages": 40, "reportType": "type2",
               "extractionPlan": {"totalExpectedControls": 96,
                 "pageRanges": [{"startPage": 10, "endPage": 33, "expectedControls": 96, "categories": ["CC1"]}]},
               "confidence": 0.8}"#,
        );
        let structure = analyzer(mock).analyze(&Document::new("d", Vec::new())).await.unwrap();

        assert_eq!(structure.total_pages, 40);
        assert_eq!(structure.extraction_plan.total_expected_records, 96);
        assert_eq!(structure.extraction_plan.page_ranges.len(), 1);
        assert_eq!(structure.analysis_confidence, 0.8);
    }

    #[tokio::test]
    async fn test_oracle_error_is_structural_failure() {
        let mut mock = MockOracle::new("{}");
        mock.add_error(prompt::STRUCTURE_HEADING, "connection reset");
        let err = analyzer(mock.clone()).analyze(&Document::new("d", Vec::new())).await.unwrap_err();

        assert!(matches!(err, ExtractorError::StructuralAnalysisFailed(ref m) if m.contains("connection reset")));
        // no retry
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unparsable_payload() {
        for response in ["not json at all", r#"{"unrelated": true}"#] {
            let err = analyzer(MockOracle::new(response))
                .analyze(&Document::new("d", Vec::new()))
                .await
                .unwrap_err();
            assert!(
                matches!(err, ExtractorError::StructuralAnalysisFailed(ref m) if m == STRUCTURE_UNPARSABLE),
                "{}",
                response
            );
        }
    }
}
