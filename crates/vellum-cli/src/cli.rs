//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Vellum - Extract controls, findings and coverage from audit reports.
#[derive(Debug, Parser)]
#[command(name = "vellum")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides the configured one)
    #[arg(long, global = true, env = "VELLUM_DB")]
    pub db: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full extraction pipeline over a PDF report
    Extract(ExtractArgs),

    /// Show the chunk plan for a stored structure analysis
    Plan(PlanArgs),

    /// Show job status for a document
    Status(StatusArgs),

    /// Show the stored extraction result for a document
    Show(ShowArgs),
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// PDF file to process
    pub file: PathBuf,

    /// Document reference (defaults to the file stem)
    #[arg(short, long)]
    pub document_ref: Option<String>,

    /// Oracle model (overrides the configured one)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Use the conservative extraction preset
    #[arg(long, conflicts_with = "no_delays")]
    pub conservative: bool,

    /// Disable pacing and backoff sleeps
    #[arg(long)]
    pub no_delays: bool,
}

/// Arguments for the plan command.
#[derive(Debug, Parser)]
pub struct PlanArgs {
    /// JSON file holding a structure analysis
    pub structure: PathBuf,

    /// Widest page range per chunk (overrides the configured one)
    #[arg(long)]
    pub max_pages: Option<u32>,
}

/// Arguments for the status command.
#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Document reference
    pub document_ref: String,

    /// Show up to N past jobs instead of the latest one
    #[arg(long, conflicts_with = "fail")]
    pub history: Option<usize>,

    /// Mark the document's unfinished job as failed so it can be re-run
    #[arg(long)]
    pub fail: bool,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Document reference
    pub document_ref: String,

    /// List every extracted record
    #[arg(short, long)]
    pub records: bool,

    /// List coverage gaps
    #[arg(short, long)]
    pub gaps: bool,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_command() {
        let cli = Cli::parse_from(["vellum", "extract", "report.pdf", "--no-delays", "-d", "acme-2024"]);
        match cli.command {
            Command::Extract(args) => {
                assert_eq!(args.file, PathBuf::from("report.pdf"));
                assert_eq!(args.document_ref.as_deref(), Some("acme-2024"));
                assert!(args.no_delays);
                assert!(!args.conservative);
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_presets_conflict() {
        let result = Cli::try_parse_from(["vellum", "extract", "r.pdf", "--conservative", "--no-delays"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli = Cli::parse_from(["vellum", "show", "acme", "--records", "-f", "json", "-vv", "--no-color"]);
        assert_eq!(cli.verbose, 2);
        assert!(cli.no_color);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        assert!(matches!(cli.command, Command::Show(ShowArgs { records: true, gaps: false, .. })));
    }

    #[test]
    fn test_status_history() {
        let cli = Cli::parse_from(["vellum", "status", "acme", "--history", "5"]);
        match cli.command {
            Command::Status(args) => assert_eq!(args.history, Some(5)),
            _ => panic!("Expected Status command"),
        }
    }
}
