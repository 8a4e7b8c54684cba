//! Status command implementation.

use crate::cli::StatusArgs;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use vellum_domain::JobHandle;
use vellum_store::{JobRecord, SqliteStore};

/// Message recorded on a job failed from the command line.
pub const OPERATOR_FAILURE: &str = "failed by operator";

/// Execute the status command.
pub fn execute_status(args: StatusArgs, store: &mut SqliteStore, formatter: &Formatter) -> Result<()> {
    if args.fail {
        let handle = fail_active(&args, store)?;
        println!("{}", formatter.success(&format!("Job {} marked failed", handle)));
    }
    let jobs = find_jobs(&args, store)?;
    println!("{}", formatter.format_jobs(&jobs)?);
    Ok(())
}

/// Fail the unfinished job for the document.
pub fn fail_active(args: &StatusArgs, store: &mut SqliteStore) -> Result<JobHandle> {
    store
        .fail_active_job(&args.document_ref, OPERATOR_FAILURE)?
        .ok_or_else(|| CliError::InvalidInput(format!("'{}' has no unfinished job", args.document_ref)))
}

/// Latest job, or up to `--history` jobs newest first.
pub fn find_jobs(args: &StatusArgs, store: &SqliteStore) -> Result<Vec<JobRecord>> {
    let jobs = match args.history {
        Some(0) => return Err(CliError::InvalidInput("--history must be greater than 0".to_string())),
        Some(limit) => store.job_history(&args.document_ref, limit)?,
        None => store.latest_job_for(&args.document_ref)?.into_iter().collect(),
    };

    if jobs.is_empty() {
        return Err(CliError::NotFound(args.document_ref.clone()));
    }
    Ok(jobs)
}
