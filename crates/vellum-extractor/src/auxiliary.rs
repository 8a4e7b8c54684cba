//! Single-shot metadata and auxiliary extraction
//!
//! Neither call can fail the job. Failures are logged and replaced by an
//! empty value with zero confidence.

use crate::client::OracleClient;
use crate::error::ExtractorError;
use crate::parser;
use crate::prompt;
use tracing::{info, warn};
use vellum_domain::traits::DocumentOracle;
use vellum_domain::{DerivedObligation, Document, DocumentMetadata, SecondaryEntity};

/// Secondary entities and derived obligations of a document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Auxiliary {
    /// Subcontracted or supporting third parties
    pub secondary_entities: Vec<SecondaryEntity>,
    /// Customer-side obligations
    pub derived_obligations: Vec<DerivedObligation>,
    /// Confidence of the extraction (zero when it failed)
    pub confidence: f64,
}

/// Runs the metadata and auxiliary calls
pub struct AuxiliaryExtractor<O> {
    client: OracleClient<O>,
    max_output_tokens: u32,
}

impl<O> AuxiliaryExtractor<O>
where
    O: DocumentOracle + Send + Sync + 'static,
{
    /// Create an extractor sharing `client`
    pub fn new(client: OracleClient<O>, max_output_tokens: u32) -> Self {
        Self {
            client,
            max_output_tokens,
        }
    }

    /// Extract document metadata, or the empty default on failure
    pub async fn metadata(&self, document: &Document) -> DocumentMetadata {
        match self.try_metadata(document).await {
            Ok(metadata) => {
                info!(
                    issuer = metadata.issuer.as_deref().unwrap_or("-"),
                    opinion = ?metadata.opinion,
                    "Metadata extracted"
                );
                metadata
            }
            Err(e) => {
                warn!(error = %e, "{}", e);
                DocumentMetadata::empty()
            }
        }
    }

    /// Extract secondary entities and obligations, or empty lists on failure
    pub async fn auxiliary(&self, document: &Document) -> Auxiliary {
        match self.try_auxiliary(document).await {
            Ok(auxiliary) => {
                info!(
                    secondary_entities = auxiliary.secondary_entities.len(),
                    derived_obligations = auxiliary.derived_obligations.len(),
                    "Auxiliary data extracted"
                );
                auxiliary
            }
            Err(e) => {
                warn!(error = %e, "{}", e);
                Auxiliary::default()
            }
        }
    }

    async fn try_metadata(&self, document: &Document) -> Result<DocumentMetadata, ExtractorError> {
        let failed = |reason: String| ExtractorError::AuxiliaryExtractionFailed {
            phase: "metadata",
            reason,
        };
        let text = self
            .client
            .invoke(document, prompt::metadata_instruction(), self.max_output_tokens)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let obj = parser::parse_object(&text).map_err(|e| failed(e.to_string()))?;
        let metadata = parser::metadata(&obj);
        if metadata.is_empty() {
            return Err(failed("no metadata fields in response".to_string()));
        }
        Ok(metadata)
    }

    async fn try_auxiliary(&self, document: &Document) -> Result<Auxiliary, ExtractorError> {
        let failed = |reason: String| ExtractorError::AuxiliaryExtractionFailed {
            phase: "auxiliary",
            reason,
        };
        let text = self
            .client
            .invoke(document, prompt::auxiliary_instruction(), self.max_output_tokens)
            .await
            .map_err(|e| failed(e.to_string()))?;
        let obj = parser::parse_object(&text).map_err(|e| failed(e.to_string()))?;
        let (secondary_entities, derived_obligations, confidence) = parser::auxiliary(&obj);
        Ok(Auxiliary {
            secondary_entities,
            derived_obligations,
            confidence,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_domain::Opinion;
    use vellum_oracle::MockOracle;

    fn extractor(mock: &MockOracle) -> AuxiliaryExtractor<MockOracle> {
        AuxiliaryExtractor::new(OracleClient::new(mock.clone()), 4096)
    }

    #[tokio::test]
    async fn test_metadata_parsed() {
        let mut mock = MockOracle::default();
        mock.add_response(
            prompt::METADATA_HEADING,
            r#"{"metadata": {"auditFirm": "Example LLP", "opinion": "unqualified",
                "periodStart": "2024-01-01", "periodEnd": "2024-12-31"}, "confidence": 0.95}"#,
        );
        let metadata = extractor(&mock).metadata(&Document::new("d", Vec::new())).await;

        assert_eq!(metadata.issuer.as_deref(), Some("Example LLP"));
        assert_eq!(metadata.opinion, Opinion::Unqualified);
        assert_eq!(metadata.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_metadata_failure_yields_empty() {
        let mut mock = MockOracle::default();
        mock.add_error(prompt::METADATA_HEADING, "503");
        let metadata = extractor(&mock).metadata(&Document::new("d", Vec::new())).await;
        assert!(metadata.is_empty());
        assert_eq!(metadata.confidence, 0.0);
        assert_eq!(mock.call_count(), 1);

        // an object with nothing in it also counts as a failure
        let metadata = extractor(&MockOracle::new("{}"))
            .metadata(&Document::new("d", Vec::new()))
            .await;
        assert_eq!(metadata.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_auxiliary_parsed() {
        let mut mock = MockOracle::default();
        mock.add_response(
            prompt::AUXILIARY_HEADING,
            r#"{"subserviceOrgs": [{"name": "CloudCo", "serviceDescription": "Hosting", "carveOut": true}],
                "cuecs": [{"id": "CUEC-1", "description": "Review access", "relatedControl": "CC6.1"}]}"#,
        );
        let auxiliary = extractor(&mock).auxiliary(&Document::new("d", Vec::new())).await;

        assert_eq!(auxiliary.secondary_entities.len(), 1);
        assert!(auxiliary.secondary_entities[0].carved_out);
        assert_eq!(auxiliary.derived_obligations[0].related_key.as_deref(), Some("CC6.1"));
        assert_eq!(auxiliary.confidence, parser::DEFAULT_AUXILIARY_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_auxiliary_failure_yields_empty() {
        let auxiliary = extractor(&MockOracle::new("no json here"))
            .auxiliary(&Document::new("d", Vec::new()))
            .await;
        assert_eq!(auxiliary, Auxiliary::default());
    }
}
