//! Vellum Oracle Layer
//!
//! Implementations of the `DocumentOracle` trait from `vellum-domain`, plus
//! the pluggable classification of the oracle's opaque error text.
//!
//! # Oracles
//!
//! - `MockOracle`: Deterministic, scripted oracle for testing
//! - `GeminiOracle`: Google Generative Language API (PDF sent inline)
//!
//! # Examples
//!
//! ```
//! use vellum_oracle::MockOracle;
//! use vellum_domain::traits::{DocumentOracle, OracleRequest};
//! use vellum_domain::Document;
//!
//! let oracle = MockOracle::new(r#"{"records": []}"#);
//! let doc = Document::new("doc-1", b"%PDF".to_vec());
//! let answer = oracle.invoke(&OracleRequest::new(&doc, "extract", 1024)).unwrap();
//! assert_eq!(answer, r#"{"records": []}"#);
//! ```

#![warn(missing_docs)]

pub mod classify;
pub mod gemini;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use vellum_domain::traits::{DocumentOracle, OracleRequest};

pub use classify::{ErrorClass, ErrorClassifier, SubstringClassifier};
pub use gemini::GeminiOracle;

/// Errors that can occur during oracle calls
#[derive(Error, Debug)]
pub enum OracleError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Response did not have the expected envelope
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Quota or throughput limit hit
    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    /// Generic error
    #[error("Oracle error: {0}")]
    Other(String),
}

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Error(String),
}

#[derive(Debug)]
struct Rule {
    needle: String,
    queued: VecDeque<MockReply>,
    standing: Option<MockReply>,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<Rule>,
    instructions: Vec<String>,
}

/// Mock oracle for deterministic testing
///
/// Replies are chosen by instruction substring: the first rule whose needle
/// occurs in the instruction answers, consuming one-shot queued replies
/// before falling back to its standing reply. Instructions that match no
/// rule get the default response.
///
/// # Examples
///
/// ```
/// use vellum_oracle::MockOracle;
/// use vellum_domain::traits::{DocumentOracle, OracleRequest};
/// use vellum_domain::Document;
///
/// let doc = Document::new("doc-1", Vec::new());
/// let mut oracle = MockOracle::new("default");
/// oracle.queue_error("pages 1-8", "503 unavailable");
/// oracle.add_response("pages 1-8", "recovered");
///
/// let req = OracleRequest::new(&doc, "extract pages 1-8", 10);
/// assert!(oracle.invoke(&req).is_err());
/// assert_eq!(oracle.invoke(&req).unwrap(), "recovered");
/// assert_eq!(oracle.call_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct MockOracle {
    default_response: String,
    state: Arc<Mutex<MockState>>,
}

impl MockOracle {
    /// Create a new MockOracle with a fixed response for all instructions
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            default_response: response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn rule_mut<'a>(state: &'a mut MockState, needle: &str) -> &'a mut Rule {
        let pos = match state.rules.iter().position(|r| r.needle == needle) {
            Some(pos) => pos,
            None => {
                state.rules.push(Rule {
                    needle: needle.to_string(),
                    queued: VecDeque::new(),
                    standing: None,
                });
                state.rules.len() - 1
            }
        };
        &mut state.rules[pos]
    }

    /// Answer every instruction containing `needle` with `response`
    pub fn add_response(&mut self, needle: impl Into<String>, response: impl Into<String>) {
        let mut state = self.state();
        Self::rule_mut(&mut state, &needle.into()).standing = Some(MockReply::Text(response.into()));
    }

    /// Fail every instruction containing `needle` with `message`
    pub fn add_error(&mut self, needle: impl Into<String>, message: impl Into<String>) {
        let mut state = self.state();
        Self::rule_mut(&mut state, &needle.into()).standing = Some(MockReply::Error(message.into()));
    }

    /// Answer the next matching instruction once with `response`
    pub fn queue_response(&mut self, needle: impl Into<String>, response: impl Into<String>) {
        let mut state = self.state();
        Self::rule_mut(&mut state, &needle.into())
            .queued
            .push_back(MockReply::Text(response.into()));
    }

    /// Fail the next matching instruction once with `message`
    pub fn queue_error(&mut self, needle: impl Into<String>, message: impl Into<String>) {
        let mut state = self.state();
        Self::rule_mut(&mut state, &needle.into())
            .queued
            .push_back(MockReply::Error(message.into()));
    }

    /// Get the number of times invoke was called
    pub fn call_count(&self) -> usize {
        self.state().instructions.len()
    }

    /// Number of calls whose instruction contained `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.state()
            .instructions
            .iter()
            .filter(|i| i.contains(needle))
            .count()
    }

    /// Instructions received, in call order
    pub fn instructions(&self) -> Vec<String> {
        self.state().instructions.clone()
    }

    /// Reset the call log
    pub fn reset_call_count(&self) {
        self.state().instructions.clear();
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl DocumentOracle for MockOracle {
    type Error = OracleError;

    fn invoke(&self, request: &OracleRequest) -> Result<String, Self::Error> {
        let mut state = self.state();
        state.instructions.push(request.instruction.clone());

        let reply = state
            .rules
            .iter_mut()
            .filter(|rule| request.instruction.contains(&rule.needle))
            .find_map(|rule| rule.queued.pop_front().or_else(|| rule.standing.clone()));

        match reply {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::Error(message)) => Err(OracleError::Other(message)),
            None => Ok(self.default_response.clone()),
        }
    }
}
