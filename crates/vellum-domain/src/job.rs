//! Extraction job lifecycle
//!
//! The job record is write-only telemetry from the extractor's point of view:
//! the pipeline pushes progress through the job tracker and never reads it back.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an extraction job (UUIDv7)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobHandle(u128);

impl JobHandle {
    /// Generate a new UUIDv7-based handle
    ///
    /// # Examples
    ///
    /// ```
    /// use vellum_domain::JobHandle;
    ///
    /// let handle = JobHandle::new();
    /// let parsed = JobHandle::from_string(&handle.to_string()).unwrap();
    /// assert_eq!(handle, parsed);
    /// ```
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7().as_u128())
    }

    /// Parse a handle from its UUID string form
    pub fn from_string(s: &str) -> Result<Self, String> {
        uuid::Uuid::parse_str(s)
            .map(|u| Self(u.as_u128()))
            .map_err(|e| format!("Invalid job handle: {}", e))
    }

    /// Rebuild a handle from its raw value
    pub fn from_value(value: u128) -> Self {
        Self(value)
    }

    /// Get the raw u128 value
    pub fn value(&self) -> u128 {
        self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", uuid::Uuid::from_u128(self.0))
    }
}

/// Coarse job state observed by the UI
///
/// ```text
/// pending → analyzing → extracting → verifying → mapping → complete
///                                 └──────────────┘
/// (any non-terminal state) → failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not started
    Pending,
    /// Structure analysis running
    Analyzing,
    /// Chunked and auxiliary extraction running
    Extracting,
    /// Completeness verification running
    Verifying,
    /// Deduplication and coverage mapping running
    Mapping,
    /// Finished (possibly with degraded completeness)
    Complete,
    /// Aborted
    Failed,
}

impl JobStatus {
    /// Get the status name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Analyzing => "analyzing",
            JobStatus::Extracting => "extracting",
            JobStatus::Verifying => "verifying",
            JobStatus::Mapping => "mapping",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse a status from a string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(JobStatus::Pending),
            "analyzing" => Some(JobStatus::Analyzing),
            "extracting" => Some(JobStatus::Extracting),
            "verifying" => Some(JobStatus::Verifying),
            "mapping" => Some(JobStatus::Mapping),
            "complete" => Some(JobStatus::Complete),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    /// Whether moving to `next` is a legal transition
    ///
    /// Staying in the same non-terminal state is allowed (progress updates
    /// within a phase).
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        if self.is_terminal() {
            return false;
        }
        if next == Failed || next == *self {
            return true;
        }
        matches!(
            (self, next),
            (Pending, Analyzing)
                | (Analyzing, Extracting)
                | (Extracting, Verifying)
                | (Extracting, Mapping)
                | (Verifying, Mapping)
                | (Mapping, Complete)
        )
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("Invalid job status: {}", s))
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial progress pushed to the job tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Current state
    pub status: JobStatus,
    /// Overall percentage [0, 100]
    pub percentage: u8,
    /// Short phase label
    pub phase: String,
    /// Human-readable message
    pub message: Option<String>,
    /// Chunks finished so far
    pub chunks_completed: usize,
    /// Chunks planned
    pub chunks_total: usize,
    /// Records accumulated so far
    pub records_extracted: usize,
    /// Records the structure analysis expects
    pub records_expected: u32,
}

impl JobProgress {
    /// Progress with only status, percentage and phase set
    pub fn new(status: JobStatus, percentage: u8, phase: impl Into<String>) -> Self {
        Self {
            status,
            percentage: percentage.min(100),
            phase: phase.into(),
            message: None,
            chunks_completed: 0,
            chunks_total: 0,
            records_extracted: 0,
            records_expected: 0,
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use JobStatus::*;
        let path = [Pending, Analyzing, Extracting, Verifying, Mapping, Complete];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_verification_can_be_skipped() {
        assert!(JobStatus::Extracting.can_transition_to(JobStatus::Mapping));
    }

    #[test]
    fn test_failed_reachable_from_non_terminal() {
        use JobStatus::*;
        for status in [Pending, Analyzing, Extracting, Verifying, Mapping] {
            assert!(status.can_transition_to(Failed));
        }
        assert!(!Complete.can_transition_to(Failed));
        assert!(!Failed.can_transition_to(Pending));
    }

    #[test]
    fn test_no_backwards_or_skipping_transitions() {
        assert!(!JobStatus::Mapping.can_transition_to(JobStatus::Extracting));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Extracting));
        assert!(!JobStatus::Analyzing.can_transition_to(JobStatus::Complete));
    }

    #[test]
    fn test_status_round_trip_str() {
        for status in [JobStatus::Pending, JobStatus::Verifying, JobStatus::Failed] {
            assert_eq!(JobStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn test_progress_percentage_clamped() {
        assert_eq!(JobProgress::new(JobStatus::Mapping, 250, "mapping").percentage, 100);
    }
}
