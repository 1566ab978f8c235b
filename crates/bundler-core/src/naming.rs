//! Artifact naming: output directory and file URIs under the staging
//! area, hash siblings, and the staging-to-HTTP URL rewrite.

use bundler_fs::Uri;

use crate::config::DEFAULT_FILENAME_TEMPLATE;
use crate::types::ArchiveType;

/// Extension of the sibling digest file, regardless of algorithm.
pub const HASH_FILE_EXTENSION: &str = "sha";

/// Generates the output locations for one job's artifacts.
///
/// Layout: `<staging>/<job_id>/<template>.<ext>` for archive 0 and
/// `<staging>/<job_id>/<template>_<N>.<ext>` for later archives.
#[derive(Debug, Clone)]
pub struct OutputNames {
    staging: Uri,
    job_id: String,
    template: String,
    archive_type: ArchiveType,
}

impl OutputNames {
    /// `template` is the client-supplied output filename; any extension is
    /// stripped (the archive type dictates the real one). Empty or absent
    /// falls back to the default template.
    pub fn new(
        staging: &Uri,
        job_id: &str,
        template: Option<&str>,
        archive_type: ArchiveType,
    ) -> OutputNames {
        let template = match template.map(str::trim).filter(|t| !t.is_empty()) {
            Some(name) => strip_extension(name).to_string(),
            None => DEFAULT_FILENAME_TEMPLATE.to_string(),
        };
        OutputNames {
            staging: staging.clone(),
            job_id: job_id.to_string(),
            template,
            archive_type,
        }
    }

    /// `<staging>/<job_id>/`
    pub fn output_directory(&self) -> Uri {
        self.staging.join(&self.job_id)
    }

    /// Artifact URI for one archive id.
    pub fn output_file(&self, archive_id: u32) -> Uri {
        let ext = self.archive_type.extension();
        let name = if archive_id > 0 {
            format!("{}_{}.{}", self.template, archive_id, ext)
        } else {
            format!("{}.{}", self.template, ext)
        };
        self.output_directory().join(&name)
    }

    /// Digest sibling of an artifact: the archive extension replaced by
    /// [`HASH_FILE_EXTENSION`].
    pub fn hash_file(&self, archive_id: u32) -> Uri {
        let artifact = self.output_file(archive_id);
        let path = artifact.path();
        let stem = path
            .strip_suffix(self.archive_type.extension())
            .unwrap_or(path)
            .trim_end_matches('.');
        Uri::from_parts(
            artifact.scheme(),
            &format!("{stem}.{HASH_FILE_EXTENSION}"),
        )
    }
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    }
}

/// Rewrites on-disk artifact paths into client-facing HTTP URLs by
/// replacing the staging prefix with the configured base URL.
#[derive(Debug, Clone)]
pub struct UrlBuilder {
    staging_prefix: String,
    base_url: String,
}

impl UrlBuilder {
    pub fn new(staging_prefix: &str, base_url: &str) -> UrlBuilder {
        UrlBuilder {
            staging_prefix: staging_prefix.trim_end_matches('/').to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn to_url(&self, artifact: &Uri) -> String {
        let path = artifact.path().replace('\\', "/");
        match path.strip_prefix(&self.staging_prefix) {
            Some(rest) => format!("{}/{}", self.base_url, rest.trim_start_matches('/')),
            None => path,
        }
    }
}
