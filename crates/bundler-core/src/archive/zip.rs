//! ZIP container.
//!
//! The zip central directory needs a seekable sink, so this variant
//! writes to the local staging path directly rather than through a
//! streaming blob writer. Staging is local by deployment layout; a
//! non-local output is rejected up front.

use std::fs::File;
use std::io::BufWriter;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use bundler_fs::{FileSystems, Uri};

use crate::model::ArchiveElement;
use crate::types::ArchiveType;

use super::{
    enforce_extension, open_element, remove_existing, ArchiveError, Bundler, OnEntryComplete,
};

pub struct ZipBundler;

impl Bundler for ZipBundler {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Zip
    }

    fn bundle(
        &self,
        fs: &FileSystems,
        elements: &[ArchiveElement],
        output: &Uri,
        on_entry: OnEntryComplete,
    ) -> Result<(), ArchiveError> {
        let output = enforce_extension(output, self.archive_type().extension());
        if !output.is_local() {
            return Err(ArchiveError::Io {
                uri: output.to_string(),
                message: "zip output requires a seekable local file".to_string(),
            });
        }
        remove_existing(fs, &output)?;
        debug!(output = %output, entries = elements.len(), "creating zip archive");

        let file =
            File::create(output.to_local_path()).map_err(|e| ArchiveError::io(&output, e))?;
        let mut writer = ZipWriter::new(BufWriter::new(file));
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(0o644)
            .large_file(true);

        for element in elements {
            let (mut reader, _) = open_element(fs, element)?;
            writer
                .start_file(element.entry_path.as_str(), options)
                .map_err(|e| ArchiveError::io(&element.uri, e))?;
            std::io::copy(&mut reader, &mut writer)
                .map_err(|e| ArchiveError::io(&element.uri, e))?;
            on_entry(element);
        }

        let mut buffered = writer
            .finish()
            .map_err(|e| ArchiveError::io(&output, e))?;
        std::io::Write::flush(&mut buffered).map_err(|e| ArchiveError::io(&output, e))?;
        Ok(())
    }
}
