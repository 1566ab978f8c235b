//! Client submission payloads.
//!
//! Two historical JSON shapes are accepted: a plain list of path strings
//! and a list of `{path, archive_path}` objects. The forms may be mixed
//! within one request.

use serde::{Deserialize, Serialize};

/// One requested input: a bare path/URI, or a path with an in-archive
/// relocation prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FileSpec {
    Path(String),
    Entry {
        path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        archive_path: Option<String>,
    },
}

impl FileSpec {
    pub fn path(&self) -> &str {
        match self {
            FileSpec::Path(path) => path,
            FileSpec::Entry { path, .. } => path,
        }
    }

    pub fn archive_path(&self) -> Option<&str> {
        match self {
            FileSpec::Path(_) => None,
            FileSpec::Entry { archive_path, .. } => {
                archive_path.as_deref().filter(|p| !p.is_empty())
            }
        }
    }
}

/// A bundle submission as deserialized from any of the three endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BundleRequest {
    #[serde(default)]
    pub files: Vec<FileSpec>,
    /// Requested archive type text; unknown values invalidate the
    /// request, absence means ZIP.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub archive_type: Option<String>,
    /// Target archive size in MB; clamped by configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}
