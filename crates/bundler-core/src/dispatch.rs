//! Request validation, expansion and worker fan-out.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

use bundler_fs::{FileKind, FileSystems, Uri};

use crate::config::{BundlerConfig, DEFAULT_SERVER_NAME};
use crate::entry_path::EntryPaths;
use crate::estimate::Estimator;
use crate::model::{now_millis, ArchiveElement, ArchiveJob, ArchiveJobConfig, Job, JobConfig};
use crate::naming::{OutputNames, UrlBuilder};
use crate::planner::Planner;
use crate::repo::JobStore;
use crate::request::{BundleRequest, FileSpec};
use crate::tracker::JobTracker;
use crate::types::{ArchiveType, JobState};
use crate::worker::{ArchiveWorker, WorkerContext};

/// Fallback user identity when the request and transport carry none.
pub const DEFAULT_USERNAME: &str = "unavailable";

/// Turns validated submissions into persisted jobs with running workers.
/// One instance per process; all collaborators are created at startup.
pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    fs: Arc<FileSystems>,
    config: BundlerConfig,
    entry_paths: EntryPaths,
    estimator: Estimator,
    urls: UrlBuilder,
    staging: Uri,
    handle: Handle,
}

impl JobDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        fs: Arc<FileSystems>,
        config: &BundlerConfig,
        handle: Handle,
    ) -> Self {
        let staging = Uri::parse(&config.staging_directory);
        JobDispatcher {
            store,
            fs,
            entry_paths: EntryPaths::new(config.entry_path_exclusions.clone()),
            estimator: Estimator::new(config.compression_percentage()),
            urls: UrlBuilder::new(staging.path(), &config.base_url),
            staging,
            handle,
            config: config.clone(),
        }
    }

    /// Validate, expand, plan, persist and launch one submission.
    /// Blocking; run it on a blocking thread.
    pub fn submit(&self, job_id: &str, request: &BundleRequest) {
        let user_name = request
            .user_name
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .unwrap_or(DEFAULT_USERNAME)
            .to_string();

        let requested_type = request.archive_type.as_deref().unwrap_or("ZIP");
        let Some(archive_type) = ArchiveType::parse(requested_type) else {
            warn!(job_id, requested_type, "unknown archive type requested");
            self.persist_invalid(job_id, &user_name, ArchiveType::Zip, 0);
            return;
        };

        let target_size = self
            .config
            .target_archive_size_bytes(request.max_size.unwrap_or(0));

        if request.files.is_empty() {
            warn!(job_id, "submission contains no files");
            self.persist_invalid(job_id, &user_name, archive_type, target_size);
            return;
        }

        let elements = self.expand(&request.files);
        if elements.is_empty() {
            warn!(job_id, "no valid input files after expansion");
            self.persist_invalid(job_id, &user_name, archive_type, target_size);
            return;
        }

        let names = OutputNames::new(
            &self.staging,
            job_id,
            request.output_filename.as_deref(),
            archive_type,
        );
        let planner = Planner::new(self.estimator, target_size, archive_type);
        let plans = planner.plan(elements, &names);

        let archives: Vec<ArchiveJob> = plans
            .iter()
            .map(|plan| {
                let hash_file = names.hash_file(plan.id);
                ArchiveJob::new(
                    ArchiveJobConfig {
                        job_id: job_id.to_string(),
                        archive_id: plan.id,
                        archive_type,
                        archive_file: plan.output_file.clone(),
                        archive_url: self.urls.to_url(&plan.output_file),
                        hash_url: self.urls.to_url(&hash_file),
                        hash_file,
                    },
                    &plan.elements,
                )
            })
            .collect();

        let mut job = Job::new(
            JobConfig {
                job_id: job_id.to_string(),
                user_name,
                archive_type,
                archive_size: target_size,
            },
            archives,
        );

        if let Err(e) = self.store.persist_job(&job) {
            error!(job_id, error = %e, "unable to persist job, nothing will run");
            return;
        }

        if let Err(e) = self.fs.create_dir_all(&names.output_directory()) {
            error!(job_id, error = %e, "unable to create the job output directory");
            // Workers would only churn out ERROR archives against a
            // missing directory; record the failure on the job instead.
            job.state = JobState::Error;
            job.end_time = now_millis();
            if let Err(e) = self.store.update_job(&job) {
                error!(job_id, error = %e, "unable to persist job failure");
            }
            return;
        }

        job.state = JobState::InProgress;
        job.start_time = now_millis();
        if let Err(e) = self.store.update_job(&job) {
            error!(job_id, error = %e, "unable to mark job in progress");
            return;
        }

        let tracker = Arc::new(JobTracker::new(self.store.clone(), job_id));
        let ctx = WorkerContext {
            store: self.store.clone(),
            fs: self.fs.clone(),
            tracker,
            hash_type: self.config.hash_type,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        };
        info!(
            job_id,
            archives = job.num_archives,
            files = job.num_files,
            total_size = job.total_size,
            "job dispatched"
        );
        for archive in &job.archives {
            let worker = ArchiveWorker::new(ctx.clone(), job_id, archive.archive_id);
            self.handle.spawn_blocking(move || worker.run());
        }
    }

    fn persist_invalid(
        &self,
        job_id: &str,
        user_name: &str,
        archive_type: ArchiveType,
        archive_size: u64,
    ) {
        let job = Job::invalid(JobConfig {
            job_id: job_id.to_string(),
            user_name: user_name.to_string(),
            archive_type,
            archive_size,
        });
        if let Err(e) = self.store.persist_job(&job) {
            error!(job_id, error = %e, "unable to persist invalid-request job");
        }
    }

    /// Resolve the requested paths into archive elements: plain files are
    /// taken as-is, directories are walked, anything missing or
    /// unreadable is dropped with a warning.
    fn expand(&self, files: &[FileSpec]) -> Vec<ArchiveElement> {
        let mut elements = Vec::new();
        for spec in files {
            let uri = Uri::parse(spec.path());
            match self.fs.metadata(&uri) {
                Ok(FileKind::File { size }) => {
                    let entry_path = match spec.archive_path() {
                        Some(prefix) => {
                            self.entry_paths
                                .entry_path_for(&uri, Some(parent_of(uri.path())), Some(prefix))
                        }
                        None => self.entry_paths.entry_path(&uri),
                    };
                    elements.push(ArchiveElement {
                        uri,
                        entry_path,
                        size,
                    });
                }
                Ok(FileKind::Directory) => match self.fs.walk(&uri) {
                    Ok(children) => {
                        debug!(uri = %uri, files = children.len(), "expanded directory");
                        for child in children {
                            match self.fs.size(&child) {
                                Ok(size) => {
                                    let entry_path = self.entry_paths.entry_path_for(
                                        &child,
                                        Some(uri.path()),
                                        spec.archive_path(),
                                    );
                                    elements.push(ArchiveElement {
                                        uri: child,
                                        entry_path,
                                        size,
                                    });
                                }
                                Err(e) => {
                                    warn!(uri = %child, error = %e, "skipping unreadable file")
                                }
                            }
                        }
                    }
                    Err(e) => warn!(uri = %uri, error = %e, "unable to walk directory"),
                },
                Ok(FileKind::Missing) => warn!(uri = %uri, "requested file does not exist"),
                Err(e) => warn!(uri = %uri, error = %e, "unable to inspect requested file"),
            }
        }
        elements
    }
}

fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "",
        Some(pos) => &path[..pos],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parent_strips_the_final_segment() {
        assert_eq!(parent_of("/data/in/a.bin"), "/data/in");
        assert_eq!(parent_of("/a.bin"), "");
        assert_eq!(parent_of("a.bin"), "");
    }
}
