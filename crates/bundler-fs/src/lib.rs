//! Pluggable filesystem access for the bundler.
//!
//! Every source and artifact location is a [`Uri`]; a [`FileSystems`]
//! registry maps URI schemes to [`FsProvider`] implementations. The
//! shipped providers cover `file://` (std::fs), `s3://` (object_store)
//! and `memory://` (object_store, tests).
//!
//! Providers are registered once at process start; registration is
//! idempotent and safe under concurrent callers. All operations are
//! blocking — the pipeline runs its streaming on dedicated worker
//! threads, and object-store providers bridge their async internals
//! through a tokio runtime handle.

pub mod error;
pub mod local;
pub mod object;
pub mod uri;

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use tracing::debug;

pub use error::{VfsError, VfsResult};
pub use local::LocalProvider;
pub use object::{ObjectStoreProvider, S3Config};
pub use uri::Uri;

/// What a URI currently names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    File { size: u64 },
    Directory,
    Missing,
}

/// Sink returned by [`FsProvider::create`]. `finish` must be called to
/// make the object durable; dropping without it may lose buffered data on
/// remote backends.
pub trait BlobWriter: Write + Send {
    fn finish(&mut self) -> VfsResult<()>;
}

/// One registered scheme backend.
pub trait FsProvider: Send + Sync {
    /// Open a readable byte stream plus the object's size.
    fn open(&self, uri: &Uri) -> VfsResult<(Box<dyn Read + Send>, u64)>;

    /// Create (truncate) a writable object.
    fn create(&self, uri: &Uri) -> VfsResult<Box<dyn BlobWriter>>;

    fn metadata(&self, uri: &Uri) -> VfsResult<FileKind>;

    /// Remove the object; absent objects are not an error.
    fn delete(&self, uri: &Uri) -> VfsResult<()>;

    /// Depth-first traversal returning files only.
    fn walk(&self, uri: &Uri) -> VfsResult<Vec<Uri>>;

    fn create_dir_all(&self, uri: &Uri) -> VfsResult<()>;
}

/// Scheme → provider registry. Built once at startup and shared.
pub struct FileSystems {
    providers: Mutex<HashMap<String, Arc<dyn FsProvider>>>,
}

impl FileSystems {
    /// Empty registry.
    pub fn new() -> Self {
        FileSystems {
            providers: Mutex::new(HashMap::new()),
        }
    }

    /// Registry with the local provider pre-registered.
    pub fn with_local() -> Self {
        let fs = Self::new();
        fs.register("file", Arc::new(LocalProvider::new()));
        fs
    }

    /// Register a provider for a scheme. First registration wins; later
    /// calls for the same scheme are ignored so concurrent startup paths
    /// cannot double-install.
    pub fn register(&self, scheme: &str, provider: Arc<dyn FsProvider>) {
        let mut providers = self.providers.lock().unwrap();
        let scheme = scheme.to_ascii_lowercase();
        if providers.contains_key(&scheme) {
            debug!(scheme, "filesystem provider already registered");
            return;
        }
        providers.insert(scheme, provider);
    }

    pub fn registered_schemes(&self) -> Vec<String> {
        let mut schemes: Vec<String> =
            self.providers.lock().unwrap().keys().cloned().collect();
        schemes.sort();
        schemes
    }

    fn provider(&self, uri: &Uri) -> VfsResult<Arc<dyn FsProvider>> {
        self.providers
            .lock()
            .unwrap()
            .get(uri.scheme())
            .cloned()
            .ok_or_else(|| VfsError::SchemeUnsupported {
                scheme: uri.scheme().to_string(),
            })
    }

    pub fn open(&self, uri: &Uri) -> VfsResult<(Box<dyn Read + Send>, u64)> {
        self.provider(uri)?.open(uri)
    }

    pub fn create(&self, uri: &Uri) -> VfsResult<Box<dyn BlobWriter>> {
        self.provider(uri)?.create(uri)
    }

    pub fn metadata(&self, uri: &Uri) -> VfsResult<FileKind> {
        self.provider(uri)?.metadata(uri)
    }

    pub fn exists(&self, uri: &Uri) -> VfsResult<bool> {
        Ok(!matches!(self.metadata(uri)?, FileKind::Missing))
    }

    /// Size of an existing file, or `NotFound`.
    pub fn size(&self, uri: &Uri) -> VfsResult<u64> {
        match self.metadata(uri)? {
            FileKind::File { size } => Ok(size),
            _ => Err(VfsError::NotFound {
                uri: uri.to_string(),
            }),
        }
    }

    pub fn delete(&self, uri: &Uri) -> VfsResult<()> {
        self.provider(uri)?.delete(uri)
    }

    pub fn walk(&self, uri: &Uri) -> VfsResult<Vec<Uri>> {
        self.provider(uri)?.walk(uri)
    }

    pub fn create_dir_all(&self, uri: &Uri) -> VfsResult<()> {
        self.provider(uri)?.create_dir_all(uri)
    }
}

impl Default for FileSystems {
    fn default() -> Self {
        Self::with_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_scheme_is_rejected() {
        let fs = FileSystems::with_local();
        let err = fs.metadata(&Uri::parse("gopher://x/y")).unwrap_err();
        assert!(matches!(err, VfsError::SchemeUnsupported { .. }));
    }

    #[test]
    fn registration_is_idempotent() {
        let fs = FileSystems::with_local();
        fs.register("file", Arc::new(LocalProvider::new()));
        fs.register("FILE", Arc::new(LocalProvider::new()));
        assert_eq!(fs.registered_schemes(), vec!["file"]);
    }
}
