//! Push-only job telemetry
//!
//! The reporter walks the job state machine and forwards each step to the
//! job tracker. Tracker errors are logged and otherwise ignored, and illegal
//! transitions are skipped.

use std::convert::Infallible;
use tracing::{debug, warn};
use vellum_domain::traits::JobTracker;
use vellum_domain::{JobHandle, JobProgress, JobStatus};

/// Tracker that discards everything, for runs without a job record
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTracker;

impl JobTracker for NullTracker {
    type Error = Infallible;

    fn create_job(&mut self, _document_ref: &str) -> Result<Option<JobHandle>, Self::Error> {
        Ok(Some(JobHandle::new()))
    }

    fn update_progress(&mut self, _handle: JobHandle, _progress: &JobProgress) -> Result<(), Self::Error> {
        Ok(())
    }

    fn complete_job(&mut self, _handle: JobHandle, _result_ref: &str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn fail_job(&mut self, _handle: JobHandle, _message: &str) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Forwards job progress to a tracker
pub struct JobReporter<'a, T> {
    target: Option<(&'a mut T, JobHandle)>,
    status: JobStatus,
}

impl JobReporter<'static, NullTracker> {
    /// Reporter with no tracker; only the status is kept
    pub fn detached() -> Self {
        Self {
            target: None,
            status: JobStatus::Pending,
        }
    }
}

impl<'a, T: JobTracker> JobReporter<'a, T> {
    /// Report to `tracker` for a freshly created job
    pub fn attached(tracker: &'a mut T, handle: JobHandle) -> Self {
        Self::resume(tracker, handle, JobStatus::Pending)
    }

    /// Continue reporting for a job already in `status`
    pub fn resume(tracker: &'a mut T, handle: JobHandle, status: JobStatus) -> Self {
        Self {
            target: Some((tracker, handle)),
            status,
        }
    }

    /// Current status
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Job handle, when attached
    pub fn handle(&self) -> Option<JobHandle> {
        self.target.as_ref().map(|(_, handle)| *handle)
    }

    fn advance(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            warn!(from = %self.status, to = %next, "Skipping illegal job transition");
            return false;
        }
        self.status = next;
        true
    }

    /// Push progress, moving to `progress.status`
    pub fn progress(&mut self, progress: JobProgress) {
        if !self.advance(progress.status) {
            return;
        }
        debug!(
            status = %progress.status,
            percentage = progress.percentage,
            phase = %progress.phase,
            "Job progress"
        );
        if let Some((tracker, handle)) = self.target.as_mut() {
            if let Err(e) = tracker.update_progress(*handle, &progress) {
                warn!(job = %handle, error = %e, "Failed to record job progress");
            }
        }
    }

    /// Mark the job complete
    pub fn complete(&mut self, result_ref: &str) {
        if !self.advance(JobStatus::Complete) {
            return;
        }
        if let Some((tracker, handle)) = self.target.as_mut() {
            if let Err(e) = tracker.complete_job(*handle, result_ref) {
                warn!(job = %handle, error = %e, "Failed to record job completion");
            }
        }
    }

    /// Mark the job failed
    pub fn fail(&mut self, message: &str) {
        if !self.advance(JobStatus::Failed) {
            return;
        }
        if let Some((tracker, handle)) = self.target.as_mut() {
            if let Err(e) = tracker.fail_job(*handle, message) {
                warn!(job = %handle, error = %e, "Failed to record job failure");
            }
        }
    }
}
