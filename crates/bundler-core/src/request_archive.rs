//! Debug archival of raw submissions.
//!
//! When a request directory is configured, every incoming body is dumped
//! to `<dir>/<job_id>.json` for post-mortem. Strictly best effort: any
//! failure is logged and swallowed.

use std::path::Path;

use tracing::{debug, warn};

use crate::request::BundleRequest;

pub fn archive_request(directory: Option<&str>, job_id: &str, request: &BundleRequest) {
    let Some(directory) = directory.filter(|d| !d.is_empty()) else {
        return;
    };
    let dir = Path::new(directory);
    if let Err(e) = std::fs::create_dir_all(dir) {
        warn!(directory, error = %e, "unable to create request archive directory");
        return;
    }
    let target = dir.join(format!("{job_id}.json"));
    let payload = match serde_json::to_vec_pretty(request) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(job_id, error = %e, "unable to serialize request for archival");
            return;
        }
    };
    match std::fs::write(&target, payload) {
        Ok(()) => debug!(job_id, target = %target.display(), "request archived"),
        Err(e) => warn!(job_id, error = %e, "unable to archive request"),
    }
}
