//! Archiver family: one implementation per container format behind a
//! single-method trait.
//!
//! Shared contract: delete a pre-existing output, stream every element
//! into the container in input order, fire the completion callback after
//! each entry, enforce the type's file extension on the output name.

mod ar;
mod compress;
mod cpio;
mod tar;
mod zip;

use std::io::Read;

use thiserror::Error;

use bundler_fs::{FileSystems, Uri, VfsError};

use crate::model::ArchiveElement;
use crate::types::ArchiveType;

pub use ar::ArBundler;
pub use compress::{Bzip2Bundler, GzipBundler};
pub use cpio::CpioBundler;
pub use tar::TarBundler;
pub use zip::ZipBundler;

/// Invoked after each element is fully written and its entry closed.
pub type OnEntryComplete<'a> = &'a (dyn Fn(&ArchiveElement) + Send + Sync);

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error("archive i/o failure on {uri}: {message}")]
    Io { uri: String, message: String },

    #[error("entry [ {entry} ] not representable in {format}: {reason}")]
    UnsupportedEntry {
        entry: String,
        format: &'static str,
        reason: String,
    },
}

impl ArchiveError {
    pub(crate) fn io(uri: &Uri, err: impl std::fmt::Display) -> Self {
        ArchiveError::Io {
            uri: uri.to_string(),
            message: err.to_string(),
        }
    }
}

/// One container format.
pub trait Bundler: Send + Sync {
    fn archive_type(&self) -> ArchiveType;

    /// Stream `elements` into the artifact at `output`. Entries appear in
    /// input order; `on_entry` fires once per completed entry. Any error
    /// aborts the archive — the caller owns the ERROR transition.
    fn bundle(
        &self,
        fs: &FileSystems,
        elements: &[ArchiveElement],
        output: &Uri,
        on_entry: OnEntryComplete,
    ) -> Result<(), ArchiveError>;
}

/// The archiver for a requested type.
pub fn for_type(archive_type: ArchiveType) -> Box<dyn Bundler> {
    match archive_type {
        ArchiveType::Zip => Box::new(ZipBundler),
        ArchiveType::Tar => Box::new(TarBundler),
        ArchiveType::Ar => Box::new(ArBundler),
        ArchiveType::Cpio => Box::new(CpioBundler),
        ArchiveType::Gzip => Box::new(GzipBundler),
        ArchiveType::Bzip2 => Box::new(Bzip2Bundler),
    }
}

/// Force the output name to carry the type's extension, mirroring what
/// the name generator produces.
pub(crate) fn enforce_extension(output: &Uri, extension: &str) -> Uri {
    let path = output.path();
    if path.ends_with(extension) {
        return output.clone();
    }
    let separator = if path.ends_with('.') { "" } else { "." };
    Uri::from_parts(output.scheme(), &format!("{path}{separator}{extension}"))
}

/// Remove a stale artifact before writing a fresh one. Missing outputs
/// are fine.
pub(crate) fn remove_existing(fs: &FileSystems, output: &Uri) -> Result<(), ArchiveError> {
    fs.delete(output)?;
    Ok(())
}

/// Open a source element for streaming.
pub(crate) fn open_element(
    fs: &FileSystems,
    element: &ArchiveElement,
) -> Result<(Box<dyn Read + Send>, u64), ArchiveError> {
    Ok(fs.open(&element.uri)?)
}
