//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};
use vellum_domain::{CoverageGap, ExtractedRecord, ExtractionChunk, ExtractionResult};
use vellum_store::JobRecord;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format the headline numbers of a result.
    pub fn format_summary(&self, result: &ExtractionResult) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(result)?);
        }

        let counts = &result.counts;
        let scores = &result.confidence_scores;
        let period = match (&result.metadata.period_start, &result.metadata.period_end) {
            (Some(start), Some(end)) => format!("{} to {}", start, end),
            _ => "-".to_string(),
        };

        let mut builder = Builder::default();
        builder.push_record(["Field", "Value"]);
        builder.push_record(["Document", result.document_ref.as_str()]);
        builder.push_record(["Report", result.structure.report_kind.as_str()]);
        builder.push_record(["Issuer", or_dash(&result.metadata.issuer)]);
        builder.push_record(["Subject", or_dash(&result.metadata.subject_org)]);
        builder.push_record(["Period", period.as_str()]);
        builder.push_record(["Pages", &result.structure.total_pages.to_string()]);
        builder.push_record([
            "Records".to_string(),
            format!(
                "{} ({} effective, {} with exception, {} untested)",
                counts.records, counts.effective, counts.with_exception, counts.untested
            ),
        ]);
        builder.push_record(["Exceptions", &counts.exceptions.to_string()]);
        builder.push_record(["Third parties", &counts.secondary_entities.to_string()]);
        builder.push_record(["Customer obligations", &counts.derived_obligations.to_string()]);
        builder.push_record([
            "Completeness".to_string(),
            format!(
                "{:.0}% of {} expected",
                result.completeness_rate * 100.0,
                result.structure.extraction_plan.total_expected_records
            ),
        ]);
        builder.push_record([
            "Chunks".to_string(),
            format!("{} planned, {} exhausted", counts.chunks_planned, counts.chunks_exhausted),
        ]);
        builder.push_record([
            "Verification".to_string(),
            if counts.verification_performed {
                format!("yes, {} supplemental", counts.supplemental_records)
            } else {
                "no".to_string()
            },
        ]);
        builder.push_record([
            "Coverage".to_string(),
            format!(
                "{:.0}% ({}/{} requirements)",
                result.coverage_summary.overall_score * 100.0,
                result.coverage_summary.requirements_covered,
                result.coverage_summary.requirements_total
            ),
        ]);
        builder.push_record(["Confidence", &format!("{:.2}", scores.overall)]);
        builder.push_record(["Oracle calls", &counts.oracle_calls.to_string()]);
        builder.push_record(["Time", &format!("{:.1}s", result.processing_time_ms as f64 / 1000.0)]);

        Ok(self.render(builder))
    }

    /// Format extracted records.
    pub fn format_records(&self, records: &[ExtractedRecord]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(records)?);
        }
        if records.is_empty() {
            return Ok(self.colorize("No records found.", "yellow"));
        }

        let mut builder = Builder::default();
        builder.push_record(["Key", "Category", "Result", "Page", "Confidence", "Description"]);
        for record in records {
            let state = record.result_state.as_str();
            let state = match state {
                "effective" => self.colorize(state, "green"),
                "exception" => self.colorize(state, "red"),
                _ => self.colorize(state, "yellow"),
            };
            builder.push_record([
                record.natural_key.clone(),
                record.category.clone(),
                state,
                record.location.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                format!("{:.2}", record.confidence),
                truncate(&record.description, 60),
            ]);
        }

        Ok(self.render(builder))
    }

    /// Format coverage gaps.
    pub fn format_gaps(&self, gaps: &[CoverageGap]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(gaps)?);
        }
        if gaps.is_empty() {
            return Ok(self.success("No coverage gaps."));
        }

        let mut builder = Builder::default();
        builder.push_record(["Requirement", "Name", "Level", "Missing", "Remediation"]);
        for gap in gaps {
            builder.push_record([
                gap.requirement_id.clone(),
                gap.requirement_name.clone(),
                gap.level.as_str().to_string(),
                gap.required_categories.join(", "),
                truncate(&gap.remediation, 60),
            ]);
        }

        Ok(self.render(builder))
    }

    /// Format a chunk plan.
    pub fn format_chunks(&self, chunks: &[ExtractionChunk]) -> Result<String> {
        if self.format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(chunks)?);
        }
        if chunks.is_empty() {
            return Ok(self.warning("No chunks planned: no page ranges and no controls section."));
        }

        let mut builder = Builder::default();
        builder.push_record(["#", "Pages", "Width", "Expected", "Categories"]);
        for chunk in chunks {
            builder.push_record([
                chunk.index.to_string(),
                chunk.pages().to_string(),
                chunk.width().to_string(),
                chunk.expected_records.to_string(),
                chunk.categories.join(", "),
            ]);
        }

        Ok(self.render(builder))
    }

    /// Format job rows.
    pub fn format_jobs(&self, jobs: &[JobRecord]) -> Result<String> {
        if self.format == OutputFormat::Json {
            let json_jobs: Vec<serde_json::Value> = jobs
                .iter()
                .map(|j| {
                    serde_json::json!({
                        "handle": j.handle.to_string(),
                        "document_ref": j.document_ref,
                        "status": j.status.as_str(),
                        "progress": j.progress,
                        "phase": j.phase,
                        "message": j.message,
                        "chunks": { "completed": j.chunks_completed, "total": j.chunks_total },
                        "records": { "extracted": j.records_extracted, "expected": j.records_expected },
                        "result_ref": j.result_ref,
                        "error_message": j.error_message,
                        "created_at": j.created_at,
                        "updated_at": j.updated_at,
                        "completed_at": j.completed_at
                    })
                })
                .collect();
            return Ok(serde_json::to_string_pretty(&json_jobs)?);
        }
        if jobs.is_empty() {
            return Ok(self.colorize("No jobs found.", "yellow"));
        }

        let mut builder = Builder::default();
        builder.push_record(["Job", "Status", "Progress", "Chunks", "Records", "Detail"]);
        for job in jobs {
            let status = job.status.as_str();
            let status = match status {
                "complete" => self.colorize(status, "green"),
                "failed" => self.colorize(status, "red"),
                _ => self.colorize(status, "cyan"),
            };
            let detail = job
                .error_message
                .as_deref()
                .or(job.message.as_deref())
                .or(job.phase.as_deref())
                .unwrap_or("-");
            builder.push_record([
                job.handle.to_string()[..8].to_string(), // Truncate handle for readability
                status,
                format!("{}%", job.progress),
                format!("{}/{}", job.chunks_completed, job.chunks_total),
                format!("{}/{}", job.records_extracted, job.records_expected),
                truncate(detail, 50),
            ]);
        }

        Ok(self.render(builder))
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn render(&self, builder: Builder) -> String {
        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            _ => text.to_string(),
        }
    }
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use vellum_domain::{CoverageLevel, JobHandle, JobStatus, Provenance, ResultState};

    fn record(key: &str, state: ResultState) -> ExtractedRecord {
        ExtractedRecord {
            natural_key: key.to_string(),
            area: "Logical Access".to_string(),
            category: "CC6".to_string(),
            description: "Access is reviewed quarterly".to_string(),
            result_state: state,
            procedure_note: None,
            location: Some(41),
            confidence: 0.9,
            provenance: Provenance::Verification,
        }
    }

    #[test]
    fn test_records_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter
            .format_records(&[record("CC6.1", ResultState::Effective), record("CC6.2", ResultState::Exception)])
            .unwrap();
        assert!(output.contains("CC6.1"));
        assert!(output.contains("exception"));
        assert!(output.contains("41"));
    }

    #[test]
    fn test_records_json() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_records(&[record("CC6.1", ResultState::Effective)]).unwrap();
        let parsed: Vec<ExtractedRecord> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0].natural_key, "CC6.1");
    }

    #[test]
    fn test_empty_outputs() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.format_records(&[]).unwrap(), "No records found.");
        assert_eq!(formatter.format_gaps(&[]).unwrap(), "✓ No coverage gaps.");
        assert!(formatter.format_chunks(&[]).unwrap().starts_with("⚠"));
    }

    #[test]
    fn test_gaps_table() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let gap = CoverageGap {
            requirement_id: "A.8.5".to_string(),
            requirement_name: "Secure authentication".to_string(),
            description: "No supporting controls".to_string(),
            level: CoverageLevel::None,
            required_categories: vec!["CC6".to_string()],
            remediation: "Obtain evidence of authentication controls".to_string(),
        };
        let output = formatter.format_gaps(&[gap]).unwrap();
        assert!(output.contains("A.8.5"));
        assert!(output.contains("CC6"));
    }

    #[test]
    fn test_jobs_json() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let job = JobRecord {
            handle: JobHandle::from_value(7),
            document_ref: "acme".to_string(),
            status: JobStatus::Failed,
            progress: 15,
            phase: Some("analyzing".to_string()),
            message: None,
            chunks_completed: 0,
            chunks_total: 0,
            records_extracted: 0,
            records_expected: 0,
            result_ref: None,
            error_message: Some("structure_unparsable".to_string()),
            created_at: 1,
            updated_at: 2,
            completed_at: Some(2),
        };
        let output = formatter.format_jobs(&[job]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0]["status"], "failed");
        assert_eq!(parsed[0]["error_message"], "structure_unparsable");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("done"), "✓ done");
        assert_eq!(formatter.error("bad"), "✗ bad");
        assert_eq!(formatter.info("note"), "ℹ note");
    }
}
