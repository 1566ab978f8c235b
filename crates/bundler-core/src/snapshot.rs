//! Read-side progress snapshots.
//!
//! A snapshot is a pure function of the persisted job at read time. The
//! JSON field names are wire contract — clients scrape them — and the
//! archive-thread terminology (`threads`, `threads_complete`) is kept for
//! compatibility.

use serde::{Deserialize, Serialize};

use crate::model::{now_millis, ArchiveJob, Job};
use crate::repo::{JobStore, RepoResult};
use crate::types::JobState;

/// One terminal archive as exposed to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSnapshot {
    pub archive_id: u32,
    pub state: JobState,
    pub archive_url: String,
    pub hash_url: String,
    pub num_files: u64,
    pub size: u64,
    pub host_name: String,
    pub start_time: i64,
    pub end_time: i64,
}

impl From<&ArchiveJob> for ArchiveSnapshot {
    fn from(archive: &ArchiveJob) -> Self {
        ArchiveSnapshot {
            archive_id: archive.archive_id,
            state: archive.state,
            archive_url: archive.archive_url.clone(),
            hash_url: archive.hash_url.clone(),
            num_files: archive.num_files,
            size: archive.size,
            host_name: archive.host_name.clone(),
            start_time: archive.start_time,
            end_time: archive.end_time,
        }
    }
}

/// The tracker message returned by the state endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTrackerMessage {
    pub job_id: String,
    pub user_name: String,
    pub state: JobState,
    #[serde(rename = "threads")]
    pub num_archives: u32,
    #[serde(rename = "threads_complete")]
    pub num_archives_complete: u32,
    pub hashes_complete: u32,
    pub num_files: u64,
    pub files_complete: u64,
    pub size: u64,
    pub size_complete: u64,
    pub elapsed_time: i64,
    pub archives: Vec<ArchiveSnapshot>,
}

impl JobTrackerMessage {
    /// Minimal tracker for a submission acknowledgement or an unknown
    /// job id.
    pub fn placeholder(job_id: &str, user_name: &str, state: JobState) -> Self {
        JobTrackerMessage {
            job_id: job_id.to_string(),
            user_name: user_name.to_string(),
            state,
            num_archives: 0,
            num_archives_complete: 0,
            hashes_complete: 0,
            num_files: 0,
            files_complete: 0,
            size: 0,
            size_complete: 0,
            elapsed_time: 0,
            archives: Vec::new(),
        }
    }

    /// Synthesize the snapshot from a loaded job. Counters are recomputed
    /// from the archive and entry states so the message is consistent
    /// even while the tracker's own write is in flight.
    pub fn from_job(job: &Job) -> Self {
        let mut files_complete: u64 = 0;
        let mut size_complete: u64 = 0;
        let mut archives_terminal: u32 = 0;
        let mut hashes_complete: u32 = 0;
        let mut archives = Vec::new();

        for archive in &job.archives {
            if archive.state.is_terminal() {
                archives_terminal += 1;
                archives.push(ArchiveSnapshot::from(archive));
            }
            if archive.state == JobState::Complete {
                hashes_complete += 1;
            }
            for file in &archive.files {
                if file.state == JobState::Complete {
                    files_complete += 1;
                    size_complete += file.size;
                }
            }
        }

        JobTrackerMessage {
            job_id: job.job_id.clone(),
            user_name: job.user_name.clone(),
            state: job.state,
            num_archives: job.num_archives,
            num_archives_complete: archives_terminal,
            hashes_complete,
            num_files: job.num_files,
            files_complete: files_complete.min(job.num_files),
            size: job.total_size,
            size_complete: size_complete.min(job.total_size),
            elapsed_time: elapsed_time(job.start_time, job.end_time),
            archives,
        }
    }
}

fn elapsed_time(start_time: i64, end_time: i64) -> i64 {
    if start_time <= 0 {
        return 0;
    }
    if end_time > 0 {
        end_time - start_time
    } else {
        now_millis() - start_time
    }
}

/// Load the snapshot for a job id. Unknown ids produce a NOT_AVAILABLE
/// placeholder carrying the requested id.
pub fn snapshot(store: &dyn JobStore, job_id: &str) -> RepoResult<JobTrackerMessage> {
    match store.get_job(job_id)? {
        Some(job) => Ok(JobTrackerMessage::from_job(&job)),
        None => Ok(JobTrackerMessage::placeholder(
            job_id,
            crate::dispatch::DEFAULT_USERNAME,
            JobState::NotAvailable,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArchiveElement, ArchiveJobConfig, JobConfig};
    use crate::sqlite::SqliteStore;
    use crate::types::ArchiveType;
    use bundler_fs::Uri;

    fn seeded_store() -> SqliteStore {
        let store = SqliteStore::memory().unwrap();
        let elements = vec![
            ArchiveElement {
                uri: Uri::parse("/in/a.bin"),
                entry_path: "in/a.bin".to_string(),
                size: 40,
            },
            ArchiveElement {
                uri: Uri::parse("/in/b.bin"),
                entry_path: "in/b.bin".to_string(),
                size: 60,
            },
        ];
        let archives = vec![
            ArchiveJob::new(
                ArchiveJobConfig {
                    job_id: "J".to_string(),
                    archive_id: 0,
                    archive_type: ArchiveType::Zip,
                    archive_file: Uri::parse("/s/J/out.zip"),
                    hash_file: Uri::parse("/s/J/out.sha"),
                    archive_url: "http://h/b/J/out.zip".to_string(),
                    hash_url: "http://h/b/J/out.sha".to_string(),
                },
                &elements,
            ),
            ArchiveJob::new(
                ArchiveJobConfig {
                    job_id: "J".to_string(),
                    archive_id: 1,
                    archive_type: ArchiveType::Zip,
                    archive_file: Uri::parse("/s/J/out_1.zip"),
                    hash_file: Uri::parse("/s/J/out_1.sha"),
                    archive_url: "http://h/b/J/out_1.zip".to_string(),
                    hash_url: "http://h/b/J/out_1.sha".to_string(),
                },
                &[ArchiveElement {
                    uri: Uri::parse("/in/c.bin"),
                    entry_path: "in/c.bin".to_string(),
                    size: 25,
                }],
            ),
        ];
        let mut job = Job::new(
            JobConfig {
                job_id: "J".to_string(),
                user_name: "dave".to_string(),
                archive_type: ArchiveType::Zip,
                archive_size: 1 << 20,
            },
            archives,
        );
        job.state = JobState::InProgress;
        job.start_time = now_millis() - 1000;
        store.persist_job(&job).unwrap();
        store.update_job(&job).unwrap();
        store
    }

    #[test]
    fn unknown_job_is_not_available() {
        let store = SqliteStore::memory().unwrap();
        let message = snapshot(&store, "MISSING").unwrap();
        assert_eq!(message.state, JobState::NotAvailable);
        assert_eq!(message.job_id, "MISSING");
        assert_eq!(message.user_name, "unavailable");
        assert!(message.archives.is_empty());
    }

    #[test]
    fn in_flight_job_reports_progress_and_elapsed_time() {
        let store = seeded_store();
        // Archive 0 finished, its entries are complete.
        let mut archive = store.get_archive("J", 0).unwrap().unwrap();
        archive.state = JobState::Complete;
        archive.end_time = now_millis();
        store.update_archive(&archive).unwrap();
        for file in &archive.files {
            store
                .update_file_entry_state("J", 0, &file.file_path, JobState::Complete)
                .unwrap();
        }

        let message = snapshot(&store, "J").unwrap();
        assert_eq!(message.state, JobState::InProgress);
        assert_eq!(message.num_archives, 2);
        assert_eq!(message.num_archives_complete, 1);
        assert_eq!(message.hashes_complete, 1);
        assert_eq!(message.num_files, 3);
        assert_eq!(message.files_complete, 2);
        assert_eq!(message.size, 125);
        assert_eq!(message.size_complete, 100);
        assert!(message.elapsed_time >= 1000);
        assert_eq!(message.archives.len(), 1);
        assert_eq!(message.archives[0].archive_id, 0);
    }

    #[test]
    fn wire_field_names_are_contract() {
        let message = JobTrackerMessage::placeholder("J", "u", JobState::NotStarted);
        let value = serde_json::to_value(&message).unwrap();
        for key in [
            "job_id",
            "user_name",
            "state",
            "threads",
            "threads_complete",
            "hashes_complete",
            "num_files",
            "files_complete",
            "size",
            "size_complete",
            "elapsed_time",
            "archives",
        ] {
            assert!(value.get(key).is_some(), "missing wire field {key}");
        }
        assert_eq!(value["state"], "NOT_STARTED");
    }

    #[test]
    fn error_archives_are_visible_in_the_snapshot() {
        let store = seeded_store();
        let mut archive = store.get_archive("J", 1).unwrap().unwrap();
        archive.state = JobState::Error;
        archive.end_time = now_millis();
        store.update_archive(&archive).unwrap();

        let message = snapshot(&store, "J").unwrap();
        assert_eq!(message.num_archives_complete, 1);
        assert_eq!(message.hashes_complete, 0);
        assert_eq!(message.archives.len(), 1);
        assert_eq!(message.archives[0].state, JobState::Error);
    }
}
