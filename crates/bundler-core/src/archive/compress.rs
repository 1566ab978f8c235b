//! Compressed TAR variants (GZIP, BZIP2).
//!
//! Two passes, matching the container semantics: the elements are first
//! streamed into an intermediate `.tar` next to the final output, the
//! tarball is then piped through the compressor into the final artifact,
//! and the intermediate is deleted.

use std::io::{BufWriter, Write};

use bzip2::write::BzEncoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::debug;

use bundler_fs::{FileSystems, Uri};

use crate::model::ArchiveElement;
use crate::types::ArchiveType;

use super::tar::write_tar;
use super::{enforce_extension, ArchiveError, Bundler, OnEntryComplete};

pub struct GzipBundler;

impl Bundler for GzipBundler {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Gzip
    }

    fn bundle(
        &self,
        fs: &FileSystems,
        elements: &[ArchiveElement],
        output: &Uri,
        on_entry: OnEntryComplete,
    ) -> Result<(), ArchiveError> {
        let output = enforce_extension(output, self.archive_type().extension());
        compress_tar(fs, elements, &output, on_entry, |sink| {
            Box::new(GzEncoder::new(sink, Compression::default()))
        })
    }
}

pub struct Bzip2Bundler;

impl Bundler for Bzip2Bundler {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Bzip2
    }

    fn bundle(
        &self,
        fs: &FileSystems,
        elements: &[ArchiveElement],
        output: &Uri,
        on_entry: OnEntryComplete,
    ) -> Result<(), ArchiveError> {
        let output = enforce_extension(output, self.archive_type().extension());
        compress_tar(fs, elements, &output, on_entry, |sink| {
            Box::new(BzEncoder::new(sink, bzip2::Compression::default()))
        })
    }
}

type EncoderFactory = fn(BufWriter<Box<dyn bundler_fs::BlobWriter>>) -> Box<dyn FinishingWrite>;

/// A compressor that must be explicitly finalized to flush its trailer.
trait FinishingWrite: Write {
    fn finish_stream(self: Box<Self>) -> std::io::Result<BufWriter<Box<dyn bundler_fs::BlobWriter>>>;
}

impl FinishingWrite for GzEncoder<BufWriter<Box<dyn bundler_fs::BlobWriter>>> {
    fn finish_stream(self: Box<Self>) -> std::io::Result<BufWriter<Box<dyn bundler_fs::BlobWriter>>> {
        self.finish()
    }
}

impl FinishingWrite for BzEncoder<BufWriter<Box<dyn bundler_fs::BlobWriter>>> {
    fn finish_stream(self: Box<Self>) -> std::io::Result<BufWriter<Box<dyn bundler_fs::BlobWriter>>> {
        self.finish()
    }
}

/// Intermediate tarball sibling of the final artifact: the compressor
/// extension is dropped (`x.tar.gz` → `x.tar`).
fn intermediate_tar(output: &Uri) -> Uri {
    let path = output.path();
    let stem = path
        .strip_suffix(".gz")
        .or_else(|| path.strip_suffix(".bz2"))
        .unwrap_or(path);
    if stem.ends_with(".tar") {
        Uri::from_parts(output.scheme(), stem)
    } else {
        Uri::from_parts(output.scheme(), &format!("{stem}.tar"))
    }
}

fn compress_tar(
    fs: &FileSystems,
    elements: &[ArchiveElement],
    output: &Uri,
    on_entry: OnEntryComplete,
    make_encoder: EncoderFactory,
) -> Result<(), ArchiveError> {
    let tarball = intermediate_tar(output);
    write_tar(fs, elements, &tarball, on_entry)?;
    debug!(tarball = %tarball, output = %output, "compressing tarball");

    let result = (|| {
        fs.delete(output)?;
        let (mut reader, _) = fs.open(&tarball)?;
        let sink = fs.create(output)?;
        let mut encoder = make_encoder(BufWriter::new(sink));
        std::io::copy(&mut reader, &mut encoder)
            .map_err(|e| ArchiveError::io(output, e))?;
        let buffered = encoder
            .finish_stream()
            .map_err(|e| ArchiveError::io(output, e))?;
        let mut sink = buffered
            .into_inner()
            .map_err(|e| ArchiveError::io(output, e.error()))?;
        sink.finish()?;
        Ok(())
    })();

    // The intermediate goes away on both paths; a failed cleanup is not
    // worth failing a good archive over.
    if let Err(e) = fs.delete(&tarball) {
        debug!(tarball = %tarball, error = %e, "failed to remove intermediate tarball");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn element(dir: &std::path::Path, name: &str, contents: &[u8]) -> ArchiveElement {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        ArchiveElement {
            uri: Uri::parse(&path.to_string_lossy()),
            entry_path: name.to_string(),
            size: contents.len() as u64,
        }
    }

    #[test]
    fn intermediate_name_drops_compressor_suffix() {
        assert_eq!(
            intermediate_tar(&Uri::parse("/s/J/data.tar.gz")).path(),
            "/s/J/data.tar"
        );
        assert_eq!(
            intermediate_tar(&Uri::parse("/s/J/data.tar.bz2")).path(),
            "/s/J/data.tar"
        );
    }

    #[test]
    fn gzip_output_decompresses_to_a_tar() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystems::with_local();
        let elements = vec![element(dir.path(), "a.txt", b"squeeze me")];
        let out = dir.path().join("bundle.tar.gz");

        GzipBundler
            .bundle(&fs, &elements, &Uri::parse(&out.to_string_lossy()), &|_| {})
            .unwrap();

        // Final artifact exists, the intermediate tar does not.
        assert!(out.exists());
        assert!(!dir.path().join("bundle.tar").exists());

        let mut decoder = GzDecoder::new(std::fs::File::open(&out).unwrap());
        let mut tar_bytes = Vec::new();
        decoder.read_to_end(&mut tar_bytes).unwrap();
        let mut archive = tar::Archive::new(tar_bytes.as_slice());
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.txt"]);
    }

    #[test]
    fn bzip2_produces_a_magic_tagged_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystems::with_local();
        let elements = vec![element(dir.path(), "b.txt", b"bzip payload")];
        let out = dir.path().join("bundle.tar.bz2");

        Bzip2Bundler
            .bundle(&fs, &elements, &Uri::parse(&out.to_string_lossy()), &|_| {})
            .unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert_eq!(&bytes[..3], b"BZh");
    }
}
