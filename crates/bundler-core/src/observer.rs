//! Per-entry completion persistence.

use std::sync::Arc;

use tracing::{debug, error};

use crate::model::ArchiveElement;
use crate::repo::JobStore;
use crate::types::JobState;

/// Bound to one (job, archive); marks each finished entry COMPLETE in the
/// store. Persistence failures are logged and swallowed — a missed state
/// update must never abort a running archive.
pub struct FileCompletionObserver {
    store: Arc<dyn JobStore>,
    job_id: String,
    archive_id: u32,
}

impl FileCompletionObserver {
    pub fn new(store: Arc<dyn JobStore>, job_id: &str, archive_id: u32) -> Self {
        FileCompletionObserver {
            store,
            job_id: job_id.to_string(),
            archive_id,
        }
    }

    pub fn on_entry_complete(&self, element: &ArchiveElement) {
        debug!(
            job_id = %self.job_id,
            archive_id = self.archive_id,
            entry = %element.entry_path,
            "entry complete"
        );
        if let Err(e) = self.store.update_file_entry_state(
            &self.job_id,
            self.archive_id,
            &element.uri.to_string(),
            JobState::Complete,
        ) {
            error!(
                job_id = %self.job_id,
                archive_id = self.archive_id,
                uri = %element.uri,
                error = %e,
                "failed to persist entry completion"
            );
        }
    }
}
