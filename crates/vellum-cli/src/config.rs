//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vellum_extractor::ExtractorConfig;
use vellum_oracle::gemini;

/// Default cutoff for abandoned jobs; comfortably above the slowest chunk
/// with every retry spent.
pub const DEFAULT_STALE_JOB_SECS: u64 = 3600;

/// CLI configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Oracle connection
    #[serde(default)]
    pub oracle: OracleSettings,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Extraction tuning
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Oracle connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// API base URL
    pub endpoint: String,

    /// Model name
    pub model: String,

    /// Environment variable holding the API key
    pub api_key_env: String,

    /// Per-call timeout in seconds
    pub timeout_secs: u64,
}

/// Global CLI settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Database path; defaults to `~/.vellum/vellum.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,

    /// Seconds without progress after which an unfinished job no longer
    /// blocks a new extraction; 0 disables the cutoff
    #[serde(default = "default_stale_job_secs")]
    pub stale_job_secs: u64,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
}

impl Config {
    /// Directory holding the config file and default database.
    pub fn dir() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".vellum"))
    }

    /// Get the configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(Self::dir()?.join("config.toml"))
    }

    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::path()?)
    }

    /// Load configuration from `path`, or defaults if it does not exist.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.extractor.validate().map_err(CliError::Config)?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Database path, from settings or the default location.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.settings.database {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::dir()?.join("vellum.db")),
        }
    }

    /// Cutoff after which an unfinished job counts as abandoned.
    pub fn stale_job_after(&self) -> Option<Duration> {
        match self.settings.stale_job_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    /// Read the API key from the configured environment variable.
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.oracle.api_key_env)
            .map_err(|_| CliError::Config(format!("{} is not set", self.oracle.api_key_env)))
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            endpoint: gemini::DEFAULT_ENDPOINT.to_string(),
            model: gemini::DEFAULT_MODEL.to_string(),
            api_key_env: gemini::API_KEY_ENV.to_string(),
            timeout_secs: gemini::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Table,
            database: None,
            stale_job_secs: DEFAULT_STALE_JOB_SECS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Table
}

fn default_stale_job_secs() -> u64 {
    DEFAULT_STALE_JOB_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.settings.color);
        assert_eq!(config.oracle.api_key_env, "GEMINI_API_KEY");
        assert_eq!(config.extractor, ExtractorConfig::default());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.oracle.model = "gemini-2.5-pro".to_string();
        config.settings.format = OutputFormat::Json;
        config.extractor.max_pages_per_chunk = 6;
        config.save_to(&path).unwrap();

        assert_eq!(Config::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[extractor]\nmax_retries = 5\n\n[settings]\ncolor = false\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.extractor.max_retries, 5);
        assert_eq!(config.extractor.max_pages_per_chunk, 8);
        assert!(!config.settings.color);
        assert_eq!(config.settings.stale_job_secs, DEFAULT_STALE_JOB_SECS);
        assert_eq!(config.oracle, OracleSettings::default());
    }

    #[test]
    fn test_stale_job_cutoff() {
        let mut config = Config::default();
        assert_eq!(config.stale_job_after(), Some(Duration::from_secs(DEFAULT_STALE_JOB_SECS)));
        config.settings.stale_job_secs = 0;
        assert_eq!(config.stale_job_after(), None);
    }

    #[test]
    fn test_invalid_extractor_section_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[extractor]\nmax_pages_per_chunk = 0\n").unwrap();
        assert!(matches!(Config::load_from(&path), Err(CliError::Config(_))));
    }
}
