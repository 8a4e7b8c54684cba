//! Configuration for the Extractor

use serde::{Deserialize, Serialize};
use std::time::Duration;
use vellum_coverage::CoverageConfig;

/// Configuration for the Extractor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Widest page range sent to one oracle call
    pub max_pages_per_chunk: u32,

    /// Retries per chunk after the first attempt
    pub max_retries: u32,

    /// Backoff base (milliseconds), doubled per attempt
    pub base_delay_ms: u64,

    /// Upper bound of the random jitter added to each backoff (milliseconds)
    pub max_jitter_ms: u64,

    /// Backoff multiplier applied to rate-limit failures
    pub rate_limit_multiplier: u32,

    /// Fixed sleep between chunk calls (milliseconds)
    pub pacing_delay_ms: u64,

    /// Verification runs when completeness is below this
    pub verification_completeness_threshold: f64,

    /// ...and more than this many records are expected
    pub verification_min_expected: u32,

    /// Expected records per chunk when striding the controls section directly
    pub fallback_records_per_chunk: u32,

    /// Output budget for extraction calls (tokens)
    pub max_output_tokens: u32,

    /// Output budget for the structure analysis call (tokens)
    pub analysis_max_output_tokens: u32,

    /// Coverage mapping settings
    pub coverage: CoverageConfig,
}

impl ExtractorConfig {
    /// Backoff base as a Duration
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    /// Jitter bound as a Duration
    pub fn max_jitter(&self) -> Duration {
        Duration::from_millis(self.max_jitter_ms)
    }

    /// Pacing delay as a Duration
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_pages_per_chunk == 0 {
            return Err("max_pages_per_chunk must be greater than 0".to_string());
        }
        if self.rate_limit_multiplier == 0 {
            return Err("rate_limit_multiplier must be greater than 0".to_string());
        }
        let t = self.verification_completeness_threshold;
        if !(t > 0.0 && t <= 1.0) {
            return Err(format!(
                "verification_completeness_threshold must be within (0, 1], got {}",
                t
            ));
        }
        if self.max_output_tokens == 0 || self.analysis_max_output_tokens == 0 {
            return Err("output token budgets must be greater than 0".to_string());
        }
        self.coverage.validate()
    }
}

impl Default for ExtractorConfig {
    /// Default configuration, paced for a shared per-caller quota
    fn default() -> Self {
        Self {
            max_pages_per_chunk: 8,
            max_retries: 3,
            base_delay_ms: 2_000,
            max_jitter_ms: 1_000,
            rate_limit_multiplier: 2,
            pacing_delay_ms: 2_000,
            verification_completeness_threshold: 0.9,
            verification_min_expected: 10,
            fallback_records_per_chunk: 15,
            max_output_tokens: 65_536,
            analysis_max_output_tokens: 8_192,
            coverage: CoverageConfig::default(),
        }
    }
}

impl ExtractorConfig {
    /// Conservative preset: narrower chunks, slower pacing, more retries
    pub fn conservative() -> Self {
        Self {
            max_pages_per_chunk: 6,
            max_retries: 5,
            base_delay_ms: 4_000,
            max_jitter_ms: 2_000,
            rate_limit_multiplier: 3,
            pacing_delay_ms: 5_000,
            ..Self::default()
        }
    }

    /// Default settings with every sleep set to zero
    pub fn without_delays() -> Self {
        Self {
            base_delay_ms: 0,
            max_jitter_ms: 0,
            pacing_delay_ms: 0,
            ..Self::default()
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExtractorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_pages_per_chunk, 8);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.pacing_delay(), Duration::from_secs(2));
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(ExtractorConfig::conservative().validate().is_ok());
        let fast = ExtractorConfig::without_delays();
        assert!(fast.validate().is_ok());
        assert_eq!(fast.pacing_delay(), Duration::ZERO);
        assert_eq!(fast.max_retries, 3);
    }

    #[test]
    fn test_invalid_chunk_width() {
        let mut config = ExtractorConfig::default();
        config.max_pages_per_chunk = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_threshold() {
        let mut config = ExtractorConfig::default();
        config.verification_completeness_threshold = 0.0;
        assert!(config.validate().is_err());
        config.verification_completeness_threshold = 1.2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = ExtractorConfig::conservative();
        let toml_str = config.to_toml().unwrap();
        let parsed = ExtractorConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed = ExtractorConfig::from_toml("max_retries = 1\n[coverage]\nnon_effective_discount = 0.5\n").unwrap();
        assert_eq!(parsed.max_retries, 1);
        assert_eq!(parsed.max_pages_per_chunk, 8);
        assert_eq!(parsed.coverage.non_effective_discount, 0.5);
    }
}
