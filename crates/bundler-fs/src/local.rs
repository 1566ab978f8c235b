//! `file://` provider over std::fs.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{VfsError, VfsResult};
use crate::uri::Uri;
use crate::{BlobWriter, FileKind, FsProvider};

/// Provider for the local POSIX filesystem.
#[derive(Debug, Default)]
pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        LocalProvider
    }
}

struct LocalWriter {
    file: File,
    uri: Uri,
}

impl Write for LocalWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

impl BlobWriter for LocalWriter {
    fn finish(&mut self) -> VfsResult<()> {
        self.file
            .flush()
            .map_err(|e| VfsError::from_io(&self.uri, e))
    }
}

impl FsProvider for LocalProvider {
    fn open(&self, uri: &Uri) -> VfsResult<(Box<dyn Read + Send>, u64)> {
        let path = uri.to_local_path();
        let file = File::open(&path).map_err(|e| VfsError::from_io(uri, e))?;
        let size = file
            .metadata()
            .map_err(|e| VfsError::from_io(uri, e))?
            .len();
        Ok((Box::new(file), size))
    }

    fn create(&self, uri: &Uri) -> VfsResult<Box<dyn BlobWriter>> {
        let file = File::create(uri.to_local_path()).map_err(|e| VfsError::from_io(uri, e))?;
        Ok(Box::new(LocalWriter {
            file,
            uri: uri.clone(),
        }))
    }

    fn metadata(&self, uri: &Uri) -> VfsResult<FileKind> {
        match fs::metadata(uri.to_local_path()) {
            Ok(meta) if meta.is_dir() => Ok(FileKind::Directory),
            Ok(meta) => Ok(FileKind::File { size: meta.len() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FileKind::Missing),
            Err(e) => Err(VfsError::from_io(uri, e)),
        }
    }

    fn delete(&self, uri: &Uri) -> VfsResult<()> {
        match fs::remove_file(uri.to_local_path()) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(VfsError::from_io(uri, e)),
        }
    }

    fn walk(&self, uri: &Uri) -> VfsResult<Vec<Uri>> {
        let root: &Path = &uri.to_local_path();
        if !root.exists() {
            return Err(VfsError::NotFound {
                uri: uri.to_string(),
            });
        }
        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|e| VfsError::TransientIo {
                uri: uri.to_string(),
                message: e.to_string(),
            })?;
            if entry.file_type().is_file() {
                found.push(Uri::from_parts(
                    "file",
                    &entry.path().to_string_lossy(),
                ));
            }
        }
        Ok(found)
    }

    fn create_dir_all(&self, uri: &Uri) -> VfsResult<()> {
        fs::create_dir_all(uri.to_local_path()).map_err(|e| VfsError::from_io(uri, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn open_reports_size_and_streams_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        fs::write(&path, b"0123456789").unwrap();

        let provider = LocalProvider::new();
        let uri = Uri::parse(&path.to_string_lossy());
        let (mut reader, size) = provider.open(&uri).unwrap();
        assert_eq!(size, 10);

        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"0123456789");
    }

    #[test]
    fn walk_returns_files_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested/deeper")).unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();
        fs::write(dir.path().join("nested/deeper/b.txt"), b"b").unwrap();

        let provider = LocalProvider::new();
        let uri = Uri::parse(&dir.path().to_string_lossy());
        let mut names: Vec<String> = provider
            .walk(&uri)
            .unwrap()
            .iter()
            .map(|u| u.file_name().unwrap().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn missing_file_classified_not_found() {
        let provider = LocalProvider::new();
        let err = match provider.open(&Uri::parse("/definitely/not/here.bin")) {
            Err(err) => err,
            Ok(_) => panic!("expected open() to fail for a missing file"),
        };
        assert!(err.is_not_found());
    }
}
