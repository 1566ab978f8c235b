//! Persistence contract.
//!
//! Any store satisfying [`JobStore`] can back the pipeline; each call is
//! its own transactional unit. The shipped implementation is SQLite
//! (`crate::sqlite`).

use thiserror::Error;

use crate::model::{ArchiveJob, FileEntry, Job};
use crate::types::JobState;

pub type RepoResult<T> = Result<T, RepositoryError>;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {message}")]
    Unavailable { message: String },

    #[error("corrupt row for job [ {job_id} ]: {message}")]
    Corrupt { job_id: String, message: String },
}

impl RepositoryError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        RepositoryError::Unavailable {
            message: err.to_string(),
        }
    }
}

/// Durable store for jobs, their archives and file entries.
pub trait JobStore: Send + Sync {
    /// Insert a freshly assembled job tree (job row, archive rows, file
    /// entry rows).
    fn persist_job(&self, job: &Job) -> RepoResult<()>;

    /// Update the job row's mutable columns. Child rows are untouched.
    fn update_job(&self, job: &Job) -> RepoResult<()>;

    /// Update an archive row's mutable columns.
    fn update_archive(&self, archive: &ArchiveJob) -> RepoResult<()>;

    fn update_file_entry_state(
        &self,
        job_id: &str,
        archive_id: u32,
        file_path: &str,
        state: JobState,
    ) -> RepoResult<()>;

    /// Load the full job tree.
    fn get_job(&self, job_id: &str) -> RepoResult<Option<Job>>;

    /// Load one archive with its file entries.
    fn get_archive(&self, job_id: &str, archive_id: u32) -> RepoResult<Option<ArchiveJob>>;

    fn get_file_entry(
        &self,
        job_id: &str,
        archive_id: u32,
        file_path: &str,
    ) -> RepoResult<Option<FileEntry>>;

    fn list_job_ids(&self) -> RepoResult<Vec<String>>;
}
