//! Extract command implementation.

use crate::cli::ExtractArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use std::fs;
use std::path::Path;
use std::time::Duration;
use vellum_domain::Document;
use vellum_extractor::{ExtractorConfig, ExtractorError, Pipeline};
use vellum_oracle::GeminiOracle;
use vellum_store::SqliteStore;

/// Execute the extract command.
///
/// The Gemini client is blocking, so it is built and dropped outside the
/// runtime; only the pipeline run itself is driven by `block_on`.
pub fn execute_extract(args: ExtractArgs, config: &Config, database: &Path, formatter: &Formatter) -> Result<()> {
    let extractor = extractor_config(&args, &config.extractor);
    let document_ref = match &args.document_ref {
        Some(reference) => reference.clone(),
        None => default_document_ref(&args.file)?,
    };

    let payload = fs::read(&args.file)?;
    if !payload.starts_with(b"%PDF") {
        return Err(CliError::InvalidInput(format!("{} is not a PDF file", args.file.display())));
    }

    let model = args.model.clone().unwrap_or_else(|| config.oracle.model.clone());
    let oracle = GeminiOracle::with_endpoint(
        &config.oracle.endpoint,
        config.api_key()?,
        model,
        Duration::from_secs(config.oracle.timeout_secs),
    )?;
    let pipeline = Pipeline::new(oracle, extractor)?;
    let mut store = SqliteStore::new(database)?;
    if let Some(stale_after) = config.stale_job_after() {
        store = store.with_stale_after(stale_after);
    }
    let document = Document::new(document_ref, payload);

    println!(
        "{}",
        formatter.info(&format!(
            "Extracting '{}' ({} KiB)",
            document.reference,
            document.len() / 1024
        ))
    );

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let outcome = runtime.block_on(pipeline.run(&document, &mut store));
    drop(runtime);

    match outcome {
        Ok(run) => {
            println!(
                "{}",
                formatter.success(&format!("Stored result {} (job {})", run.result_ref, run.handle))
            );
            println!("{}", formatter.format_summary(&run.result)?);
            Ok(())
        }
        Err(err @ ExtractorError::PersistenceFailed { .. }) => {
            let message = err.to_string();
            if let Some(result) = err.into_unsaved_result() {
                println!("{}", formatter.warning("Result below was not stored"));
                println!("{}", formatter.format_summary(&result)?);
            }
            Err(CliError::NotStored(message))
        }
        Err(err) => Err(err.into()),
    }
}

/// Resolve the extractor settings for this run.
///
/// Presets keep the configured coverage table; `--no-delays` zeroes every
/// sleep on top of whatever the file configured.
pub fn extractor_config(args: &ExtractArgs, base: &ExtractorConfig) -> ExtractorConfig {
    if args.conservative {
        return ExtractorConfig {
            coverage: base.coverage.clone(),
            ..ExtractorConfig::conservative()
        };
    }

    let mut config = base.clone();
    if args.no_delays {
        config.base_delay_ms = 0;
        config.max_jitter_ms = 0;
        config.pacing_delay_ms = 0;
    }
    config
}

/// Document reference derived from the file name.
pub fn default_document_ref(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CliError::InvalidInput(format!("Cannot derive a document reference from {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args() -> ExtractArgs {
        ExtractArgs {
            file: PathBuf::from("reports/acme-soc2-2024.pdf"),
            document_ref: None,
            model: None,
            conservative: false,
            no_delays: false,
        }
    }

    #[test]
    fn test_default_document_ref() {
        assert_eq!(default_document_ref(Path::new("reports/acme-soc2-2024.pdf")).unwrap(), "acme-soc2-2024");
        assert!(default_document_ref(Path::new("/")).is_err());
    }

    #[test]
    fn test_config_passthrough() {
        let mut base = ExtractorConfig::default();
        base.max_pages_per_chunk = 5;
        assert_eq!(extractor_config(&args(), &base), base);
    }

    #[test]
    fn test_no_delays_keeps_other_settings() {
        let mut base = ExtractorConfig::default();
        base.max_retries = 7;
        let config = extractor_config(&ExtractArgs { no_delays: true, ..args() }, &base);
        assert_eq!(config.pacing_delay(), Duration::ZERO);
        assert_eq!(config.base_delay(), Duration::ZERO);
        assert_eq!(config.max_jitter(), Duration::ZERO);
        assert_eq!(config.max_retries, 7);
    }

    #[test]
    fn test_conservative_preset() {
        let mut base = ExtractorConfig::default();
        base.coverage.non_effective_discount = 0.5;
        let config = extractor_config(&ExtractArgs { conservative: true, ..args() }, &base);
        assert_eq!(config.max_pages_per_chunk, ExtractorConfig::conservative().max_pages_per_chunk);
        assert_eq!(config.coverage, base.coverage);
    }

    #[test]
    fn test_rejects_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.pdf");
        fs::write(&file, b"plain text").unwrap();

        let formatter = Formatter::new(crate::config::OutputFormat::Table, false);
        let result = execute_extract(
            ExtractArgs { file, ..args() },
            &Config::default(),
            &dir.path().join("vellum.db"),
            &formatter,
        );
        assert!(matches!(result, Err(CliError::InvalidInput(_))));
    }
}
