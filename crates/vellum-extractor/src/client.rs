//! Async access to the synchronous oracle

use crate::error::ExtractorError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vellum_domain::traits::{DocumentOracle, OracleRequest};
use vellum_domain::Document;

/// Shared oracle handle that counts calls
///
/// Clones share the oracle and the call counter.
pub struct OracleClient<O> {
    oracle: Arc<O>,
    calls: Arc<AtomicUsize>,
}

impl<O> Clone for OracleClient<O> {
    fn clone(&self) -> Self {
        Self {
            oracle: Arc::clone(&self.oracle),
            calls: Arc::clone(&self.calls),
        }
    }
}

impl<O> OracleClient<O>
where
    O: DocumentOracle + Send + Sync + 'static,
{
    /// Wrap an oracle
    pub fn new(oracle: O) -> Self {
        Self::from_arc(Arc::new(oracle))
    }

    /// Wrap an already shared oracle
    pub fn from_arc(oracle: Arc<O>) -> Self {
        Self {
            oracle,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Calls made so far through this handle and its clones
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Invoke the oracle on a blocking thread
    pub async fn invoke(
        &self,
        document: &Document,
        instruction: String,
        max_output_tokens: u32,
    ) -> Result<String, ExtractorError> {
        let oracle = Arc::clone(&self.oracle);
        let request = OracleRequest::new(document, instruction, max_output_tokens);
        self.calls.fetch_add(1, Ordering::SeqCst);

        // DocumentOracle is synchronous
        tokio::task::spawn_blocking(move || {
            oracle
                .invoke(&request)
                .map_err(|e| ExtractorError::Oracle(e.to_string()))
        })
        .await
        .map_err(|e| ExtractorError::Oracle(format!("Task join error: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_oracle::MockOracle;

    #[tokio::test]
    async fn test_invoke_counts_calls() {
        let mut mock = MockOracle::new("{}");
        mock.add_error("bad", "boom");
        let client = OracleClient::new(mock);
        let shared = client.clone();
        let doc = Document::new("doc", Vec::new());

        assert_eq!(client.invoke(&doc, "good".to_string(), 10).await.unwrap(), "{}");
        let err = shared.invoke(&doc, "bad".to_string(), 10).await.unwrap_err();

        assert!(matches!(err, ExtractorError::Oracle(ref m) if m.contains("boom")));
        assert_eq!(client.calls(), 2);
    }
}
