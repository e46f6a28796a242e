//! Progress reporting for long-running jobs.

use crate::artifacts::ArtifactMeta;

/// Progress callback for reporting job status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a collection has been read or processed.
    fn collection(&self, name: &str, records: usize);
    /// Called when the job completes, with the files it wrote.
    fn done(&self, artifacts: &[ArtifactMeta]);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn collection(&self, _name: &str, _records: usize) {}
    fn done(&self, _artifacts: &[ArtifactMeta]) {}
}
