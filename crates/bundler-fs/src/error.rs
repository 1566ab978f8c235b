//! Error surface for filesystem operations.

use thiserror::Error;

use crate::uri::Uri;

pub type VfsResult<T> = Result<T, VfsError>;

/// Errors raised by providers and the registry. Every provider failure is
/// folded into one of these four shapes so callers can branch on kind
/// without knowing the backend.
#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found: {uri}")]
    NotFound { uri: String },

    #[error("permission denied: {uri}")]
    PermissionDenied { uri: String },

    #[error("no filesystem provider registered for scheme [ {scheme} ]")]
    SchemeUnsupported { scheme: String },

    #[error("i/o failure on {uri}: {message}")]
    TransientIo { uri: String, message: String },
}

impl VfsError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Classify a std::io error against the URI it occurred on.
    pub fn from_io(uri: &Uri, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound {
                uri: uri.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                uri: uri.to_string(),
            },
            _ => Self::TransientIo {
                uri: uri.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// Classify an object_store error against the URI it occurred on.
    pub fn from_object_store(uri: &Uri, err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { .. } => Self::NotFound {
                uri: uri.to_string(),
            },
            other => Self::TransientIo {
                uri: uri.to_string(),
                message: other.to_string(),
            },
        }
    }
}
