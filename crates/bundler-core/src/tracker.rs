//! Job-level aggregation of archive completions.

use std::sync::{Arc, Mutex};

use tracing::{debug, error, info, warn};

use crate::model::{now_millis, Job};
use crate::repo::JobStore;
use crate::types::JobState;

/// Aggregates archive terminations into the owning job's counters and
/// terminal state.
///
/// `notify` is serialized per tracker instance: the reload, recompute and
/// persist steps execute atomically with respect to other notifications
/// for the same job, so the final persisted job is independent of the
/// completion interleaving.
pub struct JobTracker {
    store: Arc<dyn JobStore>,
    job_id: String,
    gate: Mutex<()>,
}

impl JobTracker {
    pub fn new(store: Arc<dyn JobStore>, job_id: &str) -> Self {
        JobTracker {
            store,
            job_id: job_id.to_string(),
            gate: Mutex::new(()),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// An archive reached a terminal state.
    pub fn notify(&self, archive_id: u32) {
        let _gate = match self.gate.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        info!(job_id = %self.job_id, archive_id, "archive completed");

        let mut job = match self.store.get_job(&self.job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                error!(job_id = %self.job_id, "job not found while handling completion");
                return;
            }
            Err(e) => {
                error!(job_id = %self.job_id, error = %e, "unable to load job");
                return;
            }
        };

        let Some(archive) = job.archive_mut(archive_id) else {
            error!(
                job_id = %self.job_id,
                archive_id,
                "no archive row matches the completion notification"
            );
            return;
        };

        // A completion can outrun the visibility of the worker's terminal
        // write. If the fresh read still shows a non-terminal state, take
        // the notification as authoritative for completion. A persisted
        // ERROR stays ERROR.
        if !archive.state.is_terminal() {
            warn!(
                job_id = %self.job_id,
                archive_id,
                state = archive.state.as_str(),
                "completion received before the archive's terminal update landed"
            );
            archive.state = JobState::Complete;
            archive.end_time = now_millis();
            let coerced = archive.clone();
            if let Err(e) = self.store.update_archive(&coerced) {
                error!(
                    job_id = %self.job_id,
                    archive_id,
                    error = %e,
                    "unable to persist coerced archive state"
                );
            }
        }

        self.update_job_state(&mut job);

        if let Err(e) = self.store.update_job(&job) {
            error!(job_id = %self.job_id, error = %e, "unable to persist job aggregates");
        }
    }

    /// Recompute aggregates from the loaded job tree and flip the job to
    /// COMPLETE once every archive is terminal. ERROR archives count
    /// toward termination; partial failure stays visible on the archive
    /// rows.
    fn update_job_state(&self, job: &mut Job) {
        let mut files_complete: u64 = 0;
        let mut size_complete: u64 = 0;
        let mut archives_terminal: u32 = 0;

        for archive in &job.archives {
            if archive.state.is_terminal() {
                archives_terminal += 1;
            }
            for file in &archive.files {
                if file.state == JobState::Complete {
                    files_complete += 1;
                    size_complete += file.size;
                }
            }
        }

        if files_complete > job.num_files {
            warn!(
                job_id = %job.job_id,
                files_complete,
                expected = job.num_files,
                "files-complete exceeds the job total, clamping"
            );
            files_complete = job.num_files;
        }
        if size_complete > job.total_size {
            warn!(
                job_id = %job.job_id,
                size_complete,
                expected = job.total_size,
                "size-complete exceeds the job total, clamping"
            );
            size_complete = job.total_size;
        }

        job.num_files_complete = files_complete;
        job.total_size_complete = size_complete;
        job.num_archives_complete = archives_terminal;

        if archives_terminal == job.num_archives {
            debug!(job_id = %job.job_id, "all archives terminal, marking job complete");
            job.state = JobState::Complete;
            job.end_time = now_millis();
        } else {
            debug!(
                job_id = %job.job_id,
                archives_terminal,
                total = job.num_archives,
                "job still in progress"
            );
        }
    }
}
