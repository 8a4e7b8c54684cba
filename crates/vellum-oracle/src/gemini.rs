//! Gemini Oracle Implementation
//!
//! Sends the PDF inline (base64) together with the instruction to the
//! Generative Language `generateContent` endpoint and returns the concatenated
//! text parts of the first candidate.
//!
//! The client is blocking. Callers inside an async runtime should invoke it
//! through `spawn_blocking`, and must construct and drop it outside async
//! contexts.
//!
//! # Examples
//!
//! ```no_run
//! use vellum_oracle::GeminiOracle;
//!
//! let oracle = GeminiOracle::new("my-api-key", "gemini-2.5-flash").unwrap();
//! ```

use crate::OracleError;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use vellum_domain::traits::{DocumentOracle, OracleRequest};

/// Default API endpoint
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Default model
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Default timeout for one oracle call (10 minutes; large PDFs are slow)
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Environment variable read by [`GeminiOracle::from_env`]
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Google Gemini document oracle
pub struct GeminiOracle {
    endpoint: String,
    model: String,
    api_key: String,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Inline { inline_data: InlineData },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiOracle {
    /// Create a new oracle against the public endpoint
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_endpoint(DEFAULT_ENDPOINT, api_key, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a new oracle with an explicit endpoint and timeout
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Communication(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Create a new oracle reading the key from `GEMINI_API_KEY`
    pub fn from_env(model: impl Into<String>) -> Result<Self, OracleError> {
        let key = std::env::var(API_KEY_ENV)
            .map_err(|_| OracleError::Other(format!("{} is not set", API_KEY_ENV)))?;
        Self::new(key, model)
    }

    /// Model name in use
    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
    }

    fn request_body<'a>(request: &'a OracleRequest) -> GenerateRequest<'a> {
        let data = base64::engine::general_purpose::STANDARD.encode(&request.payload);
        GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Inline {
                        inline_data: InlineData {
                            mime_type: "application/pdf",
                            data,
                        },
                    },
                    Part::Text {
                        text: &request.instruction,
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }

    fn response_text(body: &str) -> Result<String, OracleError> {
        let parsed: GenerateResponse = serde_json::from_str(body)
            .map_err(|e| OracleError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            return Err(OracleError::InvalidResponse("Response had no text".to_string()));
        }
        Ok(text)
    }
}

impl DocumentOracle for GeminiOracle {
    type Error = OracleError;

    fn invoke(&self, request: &OracleRequest) -> Result<String, Self::Error> {
        tracing::debug!(
            model = %self.model,
            payload_bytes = request.payload.len(),
            max_output_tokens = request.max_output_tokens,
            "Invoking oracle"
        );

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(request))
            .send()
            .map_err(|e| OracleError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .unwrap_or_else(|_| "Unknown error".to_string());

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(OracleError::RateLimited(format!("HTTP {}: {}", status, body)));
        }
        if !status.is_success() {
            return Err(OracleError::Communication(format!("HTTP {}: {}", status, body)));
        }

        Self::response_text(&body)
    }
}
