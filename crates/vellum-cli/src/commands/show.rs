//! Show command implementation.

use crate::cli::ShowArgs;
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use vellum_coverage::CoverageMapper;
use vellum_store::SqliteStore;

/// Execute the show command.
pub fn execute_show(args: ShowArgs, store: &SqliteStore, config: &Config, formatter: &Formatter) -> Result<()> {
    let result = store
        .get_result(&args.document_ref)?
        .ok_or_else(|| CliError::NotFound(args.document_ref.clone()))?;

    // JSON mode prints exactly one document
    if formatter.format() == OutputFormat::Json && (args.records || args.gaps) {
        if args.records {
            println!("{}", formatter.format_records(&result.records)?);
        } else {
            let gaps = CoverageMapper::new(config.extractor.coverage.clone()).gaps(&result.coverage_summary);
            println!("{}", formatter.format_gaps(&gaps)?);
        }
        return Ok(());
    }

    println!("{}", formatter.format_summary(&result)?);
    if args.records {
        println!("{}", formatter.format_records(&result.records)?);
    }
    if args.gaps {
        let gaps = CoverageMapper::new(config.extractor.coverage.clone()).gaps(&result.coverage_summary);
        println!("{}", formatter.format_gaps(&gaps)?);
    }
    Ok(())
}
