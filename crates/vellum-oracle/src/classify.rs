//! Classification of oracle failures
//!
//! The core sees oracle errors only as text. A classifier decides whether a
//! failure is worth retrying and how long to wait before doing so.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

// Standalone three-digit tokens; digits inside longer numbers do not match
static STATUS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[1-5]\d{2}\b").expect("status pattern is valid"));

/// How a failed oracle call should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Quota or throughput limit; retry with a longer backoff
    RateLimited,
    /// Temporary failure; retry with the normal backoff
    Transient,
    /// Retrying cannot help (bad credentials, permission denied)
    Fatal,
}

impl ErrorClass {
    /// Whether another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, ErrorClass::Fatal)
    }

    /// Get the class name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorClass::RateLimited => "rate_limited",
            ErrorClass::Transient => "transient",
            ErrorClass::Fatal => "fatal",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maps an opaque error message to an [`ErrorClass`]
pub trait ErrorClassifier: Send + Sync {
    /// Classify a failure message
    fn classify(&self, message: &str) -> ErrorClass;
}

/// Case-insensitive phrase matching plus HTTP status codes
///
/// Rate-limit phrases and codes are checked first, then fatal ones. Anything
/// else is transient. Phrases match as substrings; status codes only match
/// as standalone numbers, so `request id 14031` is not a 403.
///
/// # Examples
///
/// ```
/// use vellum_oracle::{ErrorClass, ErrorClassifier, SubstringClassifier};
///
/// let classifier = SubstringClassifier::default();
/// assert_eq!(classifier.classify("HTTP 429: Resource exhausted"), ErrorClass::RateLimited);
/// assert_eq!(classifier.classify("API key not valid"), ErrorClass::Fatal);
/// assert_eq!(classifier.classify("connection reset"), ErrorClass::Transient);
/// assert_eq!(classifier.classify("HTTP 500: request id 14031"), ErrorClass::Transient);
/// ```
#[derive(Debug, Clone)]
pub struct SubstringClassifier {
    rate_limit_phrases: Vec<String>,
    fatal_phrases: Vec<String>,
    rate_limit_codes: Vec<u16>,
    fatal_codes: Vec<u16>,
}

impl SubstringClassifier {
    /// Classifier with no phrases; every failure is transient
    pub fn empty() -> Self {
        Self {
            rate_limit_phrases: Vec::new(),
            fatal_phrases: Vec::new(),
            rate_limit_codes: Vec::new(),
            fatal_codes: Vec::new(),
        }
    }

    /// Add a phrase that marks a failure as rate limited
    pub fn with_rate_limit_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.rate_limit_phrases.push(phrase.into().to_lowercase());
        self
    }

    /// Add a phrase that marks a failure as fatal
    pub fn with_fatal_phrase(mut self, phrase: impl Into<String>) -> Self {
        self.fatal_phrases.push(phrase.into().to_lowercase());
        self
    }

    /// Add an HTTP status code that marks a failure as rate limited
    pub fn with_rate_limit_status(mut self, code: u16) -> Self {
        self.rate_limit_codes.push(code);
        self
    }

    /// Add an HTTP status code that marks a failure as fatal
    pub fn with_fatal_status(mut self, code: u16) -> Self {
        self.fatal_codes.push(code);
        self
    }
}

fn status_codes(message: &str) -> Vec<u16> {
    STATUS_TOKEN
        .find_iter(message)
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

impl Default for SubstringClassifier {
    fn default() -> Self {
        ["rate limit", "quota", "resource exhausted", "too many requests"]
            .into_iter()
            .fold(Self::empty(), |c, p| c.with_rate_limit_phrase(p))
            .with_rate_limit_status(429)
            .with_fatal_phrase("api key not valid")
            .with_fatal_phrase("permission denied")
            .with_fatal_status(401)
            .with_fatal_status(403)
    }
}

impl ErrorClassifier for SubstringClassifier {
    fn classify(&self, message: &str) -> ErrorClass {
        let lower = message.to_lowercase();
        let codes = status_codes(&lower);
        let hit = |phrases: &[String], wanted: &[u16]| {
            phrases.iter().any(|p| lower.contains(p.as_str())) || codes.iter().any(|c| wanted.contains(c))
        };

        if hit(self.rate_limit_phrases.as_slice(), self.rate_limit_codes.as_slice()) {
            ErrorClass::RateLimited
        } else if hit(self.fatal_phrases.as_slice(), self.fatal_codes.as_slice()) {
            ErrorClass::Fatal
        } else {
            ErrorClass::Transient
        }
    }
}
