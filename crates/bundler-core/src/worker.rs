//! End-to-end processing of one archive.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use bundler_fs::{FileSystems, Uri};

use crate::archive;
use crate::hash;
use crate::model::{now_millis, ArchiveJob};
use crate::observer::FileCompletionObserver;
use crate::repo::JobStore;
use crate::tracker::JobTracker;
use crate::types::{HashType, JobState};

/// Worker identity recorded on claimed archives.
pub fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Shared collaborators handed to every worker of a job.
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Arc<dyn JobStore>,
    pub fs: Arc<FileSystems>,
    pub tracker: Arc<JobTracker>,
    pub hash_type: HashType,
    pub server_name: String,
}

/// Runs one archive to a terminal state:
/// claim → stream entries → hash → finalize → notify.
///
/// Runs on a blocking thread; everything it touches is streaming or
/// store I/O. Failures stay inside the worker — the archive row and the
/// tracker notification are the only outputs.
pub struct ArchiveWorker {
    ctx: WorkerContext,
    job_id: String,
    archive_id: u32,
}

impl ArchiveWorker {
    pub fn new(ctx: WorkerContext, job_id: &str, archive_id: u32) -> Self {
        ArchiveWorker {
            ctx,
            job_id: job_id.to_string(),
            archive_id,
        }
    }

    pub fn run(&self) {
        let started = now_millis();
        let Some(archive) = self.claim() else {
            return;
        };

        match self.process(&archive) {
            Ok(()) => {
                info!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    elapsed_ms = now_millis() - started,
                    "archive processing complete"
                );
                self.finish(JobState::Complete);
            }
            Err(e) => {
                error!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    error = %e,
                    "archive processing failed, marking ERROR"
                );
                self.finish(JobState::Error);
            }
        }
    }

    /// Load the archive row and mark it claimed. `None` means there is
    /// nothing to do — the row is absent or the store is down — and no
    /// state change is possible.
    fn claim(&self) -> Option<ArchiveJob> {
        let mut archive = match self.ctx.store.get_archive(&self.job_id, self.archive_id) {
            Ok(Some(archive)) => archive,
            Ok(None) => {
                error!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    "no archive row to process"
                );
                return None;
            }
            Err(e) => {
                error!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    error = %e,
                    "unable to load archive row"
                );
                return None;
            }
        };

        archive.host_name = host_name();
        archive.server_name = self.ctx.server_name.clone();
        archive.start_time = now_millis();
        archive.state = JobState::InProgress;
        if let Err(e) = self.ctx.store.update_archive(&archive) {
            error!(
                job_id = %self.job_id,
                archive_id = self.archive_id,
                error = %e,
                "unable to claim archive"
            );
            return None;
        }
        Some(archive)
    }

    /// Bundle the entries and write the sibling digest.
    fn process(&self, archive: &ArchiveJob) -> Result<(), archive::ArchiveError> {
        let bundler = archive::for_type(archive.archive_type);
        let observer =
            FileCompletionObserver::new(self.ctx.store.clone(), &self.job_id, self.archive_id);
        let output = Uri::parse(&archive.archive_file);
        let elements = archive.elements();

        bundler.bundle(&self.ctx.fs, &elements, &output, &|element| {
            observer.on_entry_complete(element)
        })?;

        let hash_file = Uri::parse(&archive.hash_file);
        debug!(
            job_id = %self.job_id,
            archive_id = self.archive_id,
            hash_file = %hash_file,
            algorithm = self.ctx.hash_type.as_str(),
            "writing archive digest"
        );
        hash::hash_file_to(&self.ctx.fs, &output, &hash_file, self.ctx.hash_type)?;
        Ok(())
    }

    /// Persist the terminal state and notify the tracker. A store outage
    /// here skips the notification — there is nothing durable to
    /// aggregate.
    fn finish(&self, end_state: JobState) {
        let mut archive = match self.ctx.store.get_archive(&self.job_id, self.archive_id) {
            Ok(Some(archive)) => archive,
            Ok(None) => {
                error!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    "archive row vanished before finalization"
                );
                return;
            }
            Err(e) => {
                error!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    error = %e,
                    "unable to reload archive for finalization"
                );
                return;
            }
        };

        if end_state == JobState::Complete {
            match self.ctx.fs.size(&Uri::parse(&archive.archive_file)) {
                Ok(artifact_size) => info!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    artifact_size,
                    "output artifact written"
                ),
                Err(e) => warn!(
                    job_id = %self.job_id,
                    archive_id = self.archive_id,
                    error = %e,
                    "unable to stat output artifact"
                ),
            }
        }

        archive.state = end_state;
        archive.end_time = now_millis();
        match self.ctx.store.update_archive(&archive) {
            Ok(()) => self.ctx.tracker.notify(self.archive_id),
            Err(e) => error!(
                job_id = %self.job_id,
                archive_id = self.archive_id,
                error = %e,
                "unable to persist terminal archive state, skipping notification"
            ),
        }
    }
}
