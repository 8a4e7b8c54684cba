//! Completeness verification: one extra call for records the chunks missed

use crate::client::OracleClient;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser;
use crate::prompt;
use std::collections::BTreeSet;
use tracing::info;
use vellum_domain::traits::DocumentOracle;
use vellum_domain::{Document, ExtractedRecord, Provenance};

/// Whether the verification pass should run
///
/// Runs only when completeness is below the threshold and enough records
/// were expected for the shortfall to matter.
///
/// ```
/// use vellum_extractor::{should_verify, ExtractorConfig};
///
/// let config = ExtractorConfig::default();
/// assert!(should_verify(0.5, 40, &config));
/// assert!(!should_verify(0.9, 40, &config));
/// assert!(!should_verify(0.5, 10, &config));
/// ```
pub fn should_verify(completeness: f64, expected: u32, config: &ExtractorConfig) -> bool {
    completeness < config.verification_completeness_threshold
        && expected > config.verification_min_expected
}

/// Asks the oracle for records whose natural keys are not yet known
pub struct Verifier<O> {
    client: OracleClient<O>,
    max_output_tokens: u32,
}

impl<O> Verifier<O>
where
    O: DocumentOracle + Send + Sync + 'static,
{
    /// Create a verifier sharing `client`
    pub fn new(client: OracleClient<O>, max_output_tokens: u32) -> Self {
        Self {
            client,
            max_output_tokens,
        }
    }

    /// Single call listing the known keys; returns the supplemental records
    pub async fn verify(
        &self,
        document: &Document,
        known: &[ExtractedRecord],
        expected: u32,
    ) -> Result<Vec<ExtractedRecord>, ExtractorError> {
        let keys: BTreeSet<&str> = known.iter().map(|r| r.natural_key.as_str()).collect();
        let keys: Vec<&str> = keys.into_iter().collect();
        info!(known = keys.len(), expected, "Running completeness verification");

        let text = self
            .client
            .invoke(
                document,
                prompt::verification_instruction(&keys, expected),
                self.max_output_tokens,
            )
            .await
            .map_err(|e| ExtractorError::VerificationFailed(e.to_string()))?;
        let obj = parser::parse_object(&text).map_err(|e| ExtractorError::VerificationFailed(e.to_string()))?;

        let records = parser::records(&obj, &[], &Provenance::Verification);
        info!(supplemental = records.len(), "Verification returned records");
        Ok(records)
    }
}
