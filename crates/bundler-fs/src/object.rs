//! Object-store backed providers (`s3://`, `memory://`).
//!
//! The pipeline streams with blocking I/O on worker threads, so the async
//! `object_store` surface is bridged through a tokio runtime handle: a GET
//! becomes a `Read` that pulls one chunk of the byte stream per refill.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as StorePath;
use object_store::{ObjectStore, PutPayload};
use tokio::runtime::Handle;

use crate::error::{VfsError, VfsResult};
use crate::uri::Uri;
use crate::{BlobWriter, FileKind, FsProvider};

/// Credential material for the S3 provider. Either an IAM role (resolved
/// through the ambient AWS credential chain) or an explicit key pair must
/// be present.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub iam_role: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl S3Config {
    /// True when at least one usable credential source is configured.
    pub fn has_credentials(&self) -> bool {
        self.iam_role.as_deref().is_some_and(|r| !r.is_empty())
            || (self.access_key.as_deref().is_some_and(|k| !k.is_empty())
                && self.secret_key.as_deref().is_some_and(|k| !k.is_empty()))
    }
}

enum Backing {
    /// One store per bucket, built lazily from the S3 config.
    S3 {
        config: S3Config,
        stores: Mutex<HashMap<String, Arc<dyn ObjectStore>>>,
    },
    /// A single shared store; the full URI path is the object key.
    Single(Arc<dyn ObjectStore>),
}

/// Provider backed by the `object_store` crate.
pub struct ObjectStoreProvider {
    backing: Backing,
    handle: Handle,
}

impl ObjectStoreProvider {
    /// S3 provider. Stores are created per bucket on first use.
    pub fn s3(config: S3Config, handle: Handle) -> Self {
        ObjectStoreProvider {
            backing: Backing::S3 {
                config,
                stores: Mutex::new(HashMap::new()),
            },
            handle,
        }
    }

    /// In-memory provider for tests.
    pub fn memory(handle: Handle) -> Self {
        ObjectStoreProvider {
            backing: Backing::Single(Arc::new(InMemory::new())),
            handle,
        }
    }

    fn build_s3(config: &S3Config, bucket: &str) -> VfsResult<Arc<dyn ObjectStore>> {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(endpoint) = config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(region) = config.region.as_deref().filter(|r| !r.is_empty()) {
            builder = builder.with_region(region);
        }
        match (
            config.access_key.as_deref().filter(|k| !k.is_empty()),
            config.secret_key.as_deref().filter(|k| !k.is_empty()),
        ) {
            (Some(access), Some(secret)) => {
                builder = builder
                    .with_access_key_id(access)
                    .with_secret_access_key(secret);
            }
            // IAM-role deployments fall through to the ambient credential
            // chain picked up by from_env.
            _ => {}
        }
        let store = builder.build().map_err(|e| VfsError::TransientIo {
            uri: format!("s3://{bucket}"),
            message: format!("failed to create S3 client: {e}"),
        })?;
        Ok(Arc::new(store))
    }

    /// Resolve a URI to (store, object key).
    fn resolve(&self, uri: &Uri) -> VfsResult<(Arc<dyn ObjectStore>, StorePath)> {
        match &self.backing {
            Backing::Single(store) => Ok((store.clone(), StorePath::from(uri.path()))),
            Backing::S3 { config, stores } => {
                let (bucket, key) = match uri.path().split_once('/') {
                    Some((bucket, key)) if !bucket.is_empty() => (bucket, key),
                    _ => {
                        return Err(VfsError::TransientIo {
                            uri: uri.to_string(),
                            message: "S3 URI must include a bucket".to_string(),
                        })
                    }
                };
                let mut stores = stores.lock().unwrap();
                let store = match stores.get(bucket) {
                    Some(store) => store.clone(),
                    None => {
                        let store = Self::build_s3(config, bucket)?;
                        stores.insert(bucket.to_string(), store.clone());
                        store
                    }
                };
                Ok((store, StorePath::from(key)))
            }
        }
    }

    /// Map an object key back to a URI in this provider's scheme.
    fn key_to_uri(&self, uri: &Uri, key: &StorePath) -> Uri {
        match &self.backing {
            Backing::Single(_) => Uri::from_parts(uri.scheme(), key.as_ref()),
            Backing::S3 { .. } => {
                let bucket = uri.path().split('/').next().unwrap_or_default();
                Uri::from_parts(uri.scheme(), &format!("{bucket}/{}", key.as_ref()))
            }
        }
    }
}

/// Blocking reader over an object's chunk stream.
struct StreamReader {
    stream: BoxStream<'static, object_store::Result<Bytes>>,
    current: Bytes,
    handle: Handle,
    uri: String,
}

impl Read for StreamReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.current.is_empty() {
            match self.handle.block_on(self.stream.next()) {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => {
                    return Err(std::io::Error::other(format!(
                        "stream read of {} failed: {e}",
                        self.uri
                    )))
                }
                None => return Ok(0),
            }
        }
        let n = self.current.len().min(buf.len());
        buf[..n].copy_from_slice(&self.current[..n]);
        self.current = self.current.slice(n..);
        Ok(n)
    }
}

/// Buffering writer that uploads the accumulated object on `finish`.
struct StreamWriter {
    store: Arc<dyn ObjectStore>,
    key: StorePath,
    handle: Handle,
    uri: Uri,
    buf: Vec<u8>,
    done: bool,
}

impl Write for StreamWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for StreamWriter {
    fn finish(&mut self) -> VfsResult<()> {
        if self.done {
            return Ok(());
        }
        let payload = PutPayload::from(std::mem::take(&mut self.buf));
        self.handle
            .block_on(self.store.put(&self.key, payload))
            .map_err(|e| VfsError::from_object_store(&self.uri, e))?;
        self.done = true;
        Ok(())
    }
}

impl FsProvider for ObjectStoreProvider {
    fn open(&self, uri: &Uri) -> VfsResult<(Box<dyn Read + Send>, u64)> {
        let (store, key) = self.resolve(uri)?;
        let result = self
            .handle
            .block_on(store.get(&key))
            .map_err(|e| VfsError::from_object_store(uri, e))?;
        let size = result.meta.size as u64;
        let reader = StreamReader {
            stream: result.into_stream().boxed(),
            current: Bytes::new(),
            handle: self.handle.clone(),
            uri: uri.to_string(),
        };
        Ok((Box::new(reader), size))
    }

    fn create(&self, uri: &Uri) -> VfsResult<Box<dyn BlobWriter>> {
        let (store, key) = self.resolve(uri)?;
        Ok(Box::new(StreamWriter {
            store,
            key,
            handle: self.handle.clone(),
            uri: uri.clone(),
            buf: Vec::new(),
            done: false,
        }))
    }

    fn metadata(&self, uri: &Uri) -> VfsResult<FileKind> {
        let (store, key) = self.resolve(uri)?;
        match self.handle.block_on(store.head(&key)) {
            Ok(meta) => Ok(FileKind::File {
                size: meta.size as u64,
            }),
            Err(object_store::Error::NotFound { .. }) => {
                // An exact object is absent; a non-empty listing under the
                // prefix means the URI names a directory.
                let listing = self.handle.block_on(async {
                    store.list(Some(&key)).next().await.transpose()
                });
                match listing {
                    Ok(Some(_)) => Ok(FileKind::Directory),
                    Ok(None) => Ok(FileKind::Missing),
                    Err(e) => Err(VfsError::from_object_store(uri, e)),
                }
            }
            Err(e) => Err(VfsError::from_object_store(uri, e)),
        }
    }

    fn delete(&self, uri: &Uri) -> VfsResult<()> {
        let (store, key) = self.resolve(uri)?;
        match self.handle.block_on(store.delete(&key)) {
            Ok(()) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(VfsError::from_object_store(uri, e)),
        }
    }

    fn walk(&self, uri: &Uri) -> VfsResult<Vec<Uri>> {
        let (store, key) = self.resolve(uri)?;
        let metas = self
            .handle
            .block_on(async {
                let mut out = Vec::new();
                let mut stream = store.list(Some(&key));
                while let Some(meta) = stream.next().await {
                    out.push(meta?);
                }
                Ok::<_, object_store::Error>(out)
            })
            .map_err(|e| VfsError::from_object_store(uri, e))?;
        Ok(metas
            .iter()
            .map(|meta| self.key_to_uri(uri, &meta.location))
            .collect())
    }

    fn create_dir_all(&self, _uri: &Uri) -> VfsResult<()> {
        // Object stores have no directories.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FsProvider;
    use std::io::Read;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap()
    }

    #[test]
    fn memory_round_trip() {
        let rt = runtime();
        let provider = ObjectStoreProvider::memory(rt.handle().clone());
        let uri = Uri::parse("memory://in/a.bin");

        let mut writer = provider.create(&uri).unwrap();
        writer.write_all(b"hello object store").unwrap();
        writer.finish().unwrap();

        let (mut reader, size) = provider.open(&uri).unwrap();
        assert_eq!(size, 18);
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"hello object store");
    }

    #[test]
    fn metadata_distinguishes_file_dir_missing() {
        let rt = runtime();
        let provider = ObjectStoreProvider::memory(rt.handle().clone());
        let file = Uri::parse("memory://data/nested/x.bin");
        let mut writer = provider.create(&file).unwrap();
        writer.write_all(b"x").unwrap();
        writer.finish().unwrap();

        assert!(matches!(
            provider.metadata(&file).unwrap(),
            FileKind::File { size: 1 }
        ));
        assert!(matches!(
            provider.metadata(&Uri::parse("memory://data")).unwrap(),
            FileKind::Directory
        ));
        assert!(matches!(
            provider.metadata(&Uri::parse("memory://nope")).unwrap(),
            FileKind::Missing
        ));
    }

    #[test]
    fn walk_lists_files_under_prefix() {
        let rt = runtime();
        let provider = ObjectStoreProvider::memory(rt.handle().clone());
        for name in ["memory://tree/a", "memory://tree/sub/b"] {
            let mut w = provider.create(&Uri::parse(name)).unwrap();
            w.write_all(b"1").unwrap();
            w.finish().unwrap();
        }
        let mut found: Vec<String> = provider
            .walk(&Uri::parse("memory://tree"))
            .unwrap()
            .iter()
            .map(|u| u.to_string())
            .collect();
        found.sort();
        assert_eq!(found, vec!["memory://tree/a", "memory://tree/sub/b"]);
    }
}
