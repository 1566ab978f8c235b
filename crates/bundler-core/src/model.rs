//! Persistent entities and the transient shapes flowing between pipeline
//! stages.
//!
//! Ownership is a tree: a `Job` owns its `ArchiveJob`s, each of which owns
//! its `FileEntry`s. Back references exist only as ids.

use serde::{Deserialize, Serialize};

use bundler_fs::Uri;

use crate::types::{ArchiveType, JobState};

/// Current wall-clock time in epoch milliseconds (UTC).
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// One source file destined for one archive. The unit the archivers
/// consume; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveElement {
    pub uri: Uri,
    pub entry_path: String,
    pub size: u64,
}

/// One source file inside one archive, as persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    pub job_id: String,
    pub archive_id: u32,
    /// Source location (full URI form).
    pub file_path: String,
    /// Path recorded inside the archive; at most 100 characters.
    pub entry_path: String,
    pub size: u64,
    pub state: JobState,
}

impl FileEntry {
    pub fn new(job_id: &str, archive_id: u32, element: &ArchiveElement) -> FileEntry {
        FileEntry {
            job_id: job_id.to_string(),
            archive_id,
            file_path: element.uri.to_string(),
            entry_path: element.entry_path.clone(),
            size: element.size,
            state: JobState::NotStarted,
        }
    }

    pub fn element(&self) -> ArchiveElement {
        ArchiveElement {
            uri: Uri::parse(&self.file_path),
            entry_path: self.entry_path.clone(),
            size: self.size,
        }
    }
}

/// Bin-packer output: the plan for one archive before it becomes a
/// persisted [`ArchiveJob`].
#[derive(Debug, Clone)]
pub struct ArchivePlan {
    pub id: u32,
    pub archive_type: ArchiveType,
    pub output_file: Uri,
    pub elements: Vec<ArchiveElement>,
    /// Estimated compressed size accumulated while packing.
    pub estimated_size: u64,
}

impl ArchivePlan {
    /// Uncompressed total of the planned entries.
    pub fn size(&self) -> u64 {
        self.elements.iter().map(|e| e.size).sum()
    }
}

/// One output archive artifact and its processing state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveJob {
    pub job_id: String,
    pub archive_id: u32,
    pub archive_type: ArchiveType,
    /// Output artifact location (URI form).
    pub archive_file: String,
    /// Sibling digest file location (URI form).
    pub hash_file: String,
    /// HTTP form of `archive_file`.
    pub archive_url: String,
    /// HTTP form of `hash_file`.
    pub hash_url: String,
    pub host_name: String,
    pub server_name: String,
    pub num_files: u64,
    /// Uncompressed byte total of the entries.
    pub size: u64,
    pub state: JobState,
    pub start_time: i64,
    pub end_time: i64,
    pub files: Vec<FileEntry>,
}

/// Identity and naming inputs for a new [`ArchiveJob`] row.
#[derive(Debug, Clone)]
pub struct ArchiveJobConfig {
    pub job_id: String,
    pub archive_id: u32,
    pub archive_type: ArchiveType,
    pub archive_file: Uri,
    pub hash_file: Uri,
    pub archive_url: String,
    pub hash_url: String,
}

impl ArchiveJob {
    /// Build a NOT_STARTED archive row from a plan. Entries are converted
    /// in plan order.
    pub fn new(config: ArchiveJobConfig, elements: &[ArchiveElement]) -> ArchiveJob {
        let files: Vec<FileEntry> = elements
            .iter()
            .map(|e| FileEntry::new(&config.job_id, config.archive_id, e))
            .collect();
        let size = files.iter().map(|f| f.size).sum();
        ArchiveJob {
            job_id: config.job_id,
            archive_id: config.archive_id,
            archive_type: config.archive_type,
            archive_file: config.archive_file.to_string(),
            hash_file: config.hash_file.to_string(),
            archive_url: config.archive_url,
            hash_url: config.hash_url,
            host_name: String::new(),
            server_name: String::new(),
            num_files: files.len() as u64,
            size,
            state: JobState::NotStarted,
            start_time: 0,
            end_time: 0,
            files,
        }
    }

    pub fn elements(&self) -> Vec<ArchiveElement> {
        self.files.iter().map(FileEntry::element).collect()
    }
}

/// The overall client submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub user_name: String,
    pub archive_type: ArchiveType,
    /// Bin-packer soft upper bound, bytes.
    pub archive_size: u64,
    pub total_size: u64,
    pub total_size_complete: u64,
    pub num_files: u64,
    pub num_files_complete: u64,
    pub num_archives: u32,
    pub num_archives_complete: u32,
    pub state: JobState,
    pub start_time: i64,
    pub end_time: i64,
    pub archives: Vec<ArchiveJob>,
}

/// Identity and sizing inputs for a new [`Job`].
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub job_id: String,
    pub user_name: String,
    pub archive_type: ArchiveType,
    pub archive_size: u64,
}

impl Job {
    /// Assemble a NOT_STARTED job owning the given archives. Aggregate
    /// counters are derived from the archives, keeping
    /// `sum(archive.size) == total_size` and
    /// `sum(archive.num_files) == num_files` by construction.
    pub fn new(config: JobConfig, archives: Vec<ArchiveJob>) -> Job {
        let total_size = archives.iter().map(|a| a.size).sum();
        let num_files = archives.iter().map(|a| a.num_files).sum();
        Job {
            job_id: config.job_id,
            user_name: config.user_name,
            archive_type: config.archive_type,
            archive_size: config.archive_size,
            total_size,
            total_size_complete: 0,
            num_files,
            num_files_complete: 0,
            num_archives: archives.len() as u32,
            num_archives_complete: 0,
            state: JobState::NotStarted,
            start_time: 0,
            end_time: 0,
            archives,
        }
    }

    /// A job recording a rejected submission. Owns no archives and never
    /// runs.
    pub fn invalid(config: JobConfig) -> Job {
        let mut job = Job::new(config, Vec::new());
        job.state = JobState::InvalidRequest;
        job
    }

    pub fn archive(&self, archive_id: u32) -> Option<&ArchiveJob> {
        self.archives.iter().find(|a| a.archive_id == archive_id)
    }

    pub fn archive_mut(&mut self, archive_id: u32) -> Option<&mut ArchiveJob> {
        self.archives
            .iter_mut()
            .find(|a| a.archive_id == archive_id)
    }
}
