//! Scheme-qualified file locations.
//!
//! A [`Uri`] is the unit every filesystem operation is keyed on: a scheme
//! plus a slash-separated path. Bare paths (no `scheme://` prefix) are
//! treated as `file://`, matching what clients actually send.

use std::fmt;
use std::path::PathBuf;

/// Default scheme applied to bare paths.
pub const FILE_SCHEME: &str = "file";

/// A parsed location: `<scheme>://<path>`.
///
/// For `file` the path is an absolute filesystem path. For object-store
/// schemes the first path segment is the bucket (or the whole path for
/// single-store backends such as `memory`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Uri {
    scheme: String,
    path: String,
}

impl Uri {
    /// Parse a location string. Anything without a `://` separator is a
    /// local path.
    pub fn parse(input: &str) -> Uri {
        let trimmed = input.trim();
        match trimmed.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() => Uri {
                scheme: scheme.to_ascii_lowercase(),
                path: rest.to_string(),
            },
            _ => Uri {
                scheme: FILE_SCHEME.to_string(),
                path: trimmed.to_string(),
            },
        }
    }

    pub fn from_parts(scheme: &str, path: &str) -> Uri {
        Uri {
            scheme: scheme.to_ascii_lowercase(),
            path: path.to_string(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The path component, scheme stripped. For `file` URIs this is the
    /// platform path (`file:///tmp/x` yields `/tmp/x`).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_local(&self) -> bool {
        self.scheme == FILE_SCHEME
    }

    /// The local filesystem path for `file` URIs.
    pub fn to_local_path(&self) -> PathBuf {
        PathBuf::from(&self.path)
    }

    /// Append a relative component, collapsing duplicate separators.
    pub fn join(&self, rel: &str) -> Uri {
        let base = self.path.trim_end_matches('/');
        let rel = rel.trim_start_matches('/');
        Uri {
            scheme: self.scheme.clone(),
            path: format!("{base}/{rel}"),
        }
    }

    /// Final path segment, if any.
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.path)
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Uri::parse(value)
    }
}
