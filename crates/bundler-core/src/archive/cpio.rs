//! CPIO container, SVR4 `newc` form.
//!
//! Each record is a 110-byte ASCII-hex header, the NUL-terminated entry
//! name padded to a 4-byte boundary, then the data padded to a 4-byte
//! boundary. The stream ends with the `TRAILER!!!` record. The header's
//! size field is 32-bit, so entries past 4 GiB fail the archive.

use std::io::{BufWriter, Write};

use tracing::debug;

use bundler_fs::{FileSystems, Uri};

use crate::model::{now_millis, ArchiveElement};
use crate::types::ArchiveType;

use super::{
    enforce_extension, open_element, remove_existing, ArchiveError, Bundler, OnEntryComplete,
};

const NEWC_MAGIC: &str = "070701";
const TRAILER_NAME: &str = "TRAILER!!!";
const REGULAR_FILE_MODE: u32 = 0o100644;

pub struct CpioBundler;

impl Bundler for CpioBundler {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Cpio
    }

    fn bundle(
        &self,
        fs: &FileSystems,
        elements: &[ArchiveElement],
        output: &Uri,
        on_entry: OnEntryComplete,
    ) -> Result<(), ArchiveError> {
        let output = enforce_extension(output, self.archive_type().extension());
        remove_existing(fs, &output)?;
        debug!(output = %output, entries = elements.len(), "creating cpio archive");

        let sink = fs.create(&output)?;
        let mut writer = BufWriter::new(sink);
        let mtime = (now_millis() / 1000) as u32;

        for (index, element) in elements.iter().enumerate() {
            let size = u32::try_from(element.size).map_err(|_| {
                ArchiveError::UnsupportedEntry {
                    entry: element.entry_path.clone(),
                    format: "cpio",
                    reason: "entry exceeds the 32-bit newc size field".to_string(),
                }
            })?;
            write_record_header(
                &mut writer,
                &element.entry_path,
                index as u32 + 1,
                REGULAR_FILE_MODE,
                size,
                mtime,
            )
            .map_err(|e| ArchiveError::io(&output, e))?;

            let (mut reader, _) = open_element(fs, element)?;
            let written = std::io::copy(&mut reader, &mut writer)
                .map_err(|e| ArchiveError::io(&element.uri, e))?;
            write_padding(&mut writer, written as usize)
                .map_err(|e| ArchiveError::io(&output, e))?;
            on_entry(element);
        }

        write_record_header(&mut writer, TRAILER_NAME, 0, 0, 0, 0)
            .map_err(|e| ArchiveError::io(&output, e))?;

        let mut sink = writer
            .into_inner()
            .map_err(|e| ArchiveError::io(&output, e.error()))?;
        sink.finish()?;
        Ok(())
    }
}

/// Header (13 8-digit hex fields after the magic) plus the padded name.
fn write_record_header(
    writer: &mut impl Write,
    name: &str,
    ino: u32,
    mode: u32,
    size: u32,
    mtime: u32,
) -> std::io::Result<()> {
    let name_size = name.len() as u32 + 1; // includes the NUL
    write!(
        writer,
        "{NEWC_MAGIC}{ino:08x}{mode:08x}{uid:08x}{gid:08x}{nlink:08x}{mtime:08x}\
         {size:08x}{devmajor:08x}{devminor:08x}{rdevmajor:08x}{rdevminor:08x}\
         {name_size:08x}{check:08x}",
        uid = 0,
        gid = 0,
        nlink = 1,
        devmajor = 0,
        devminor = 0,
        rdevmajor = 0,
        rdevminor = 0,
        check = 0,
    )?;
    writer.write_all(name.as_bytes())?;
    writer.write_all(&[0])?;
    // Name padding is computed over header + name + NUL.
    write_padding(writer, 110 + name_size as usize)
}

/// Pad to the next 4-byte boundary.
fn write_padding(writer: &mut impl Write, written: usize) -> std::io::Result<()> {
    let rem = written % 4;
    if rem != 0 {
        writer.write_all(&[0u8; 3][..4 - rem])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_header_is_aligned_ascii_hex() {
        let mut buf = Vec::new();
        write_record_header(&mut buf, "dir/a.bin", 1, REGULAR_FILE_MODE, 5, 0).unwrap();
        assert!(buf.starts_with(NEWC_MAGIC.as_bytes()));
        // 110-byte header + name + NUL, padded to 4.
        assert_eq!(buf.len() % 4, 0);
        assert_eq!(&buf[110..119], b"dir/a.bin");
        assert_eq!(buf[119], 0);
        // mode field is the second 8-hex group after the magic.
        assert_eq!(&buf[14..22], format!("{REGULAR_FILE_MODE:08x}").as_bytes());
    }

    #[test]
    fn archive_ends_with_trailer() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystems::with_local();
        let src = dir.path().join("x.bin");
        std::fs::write(&src, b"abc").unwrap();

        let elements = vec![ArchiveElement {
            uri: Uri::parse(&src.to_string_lossy()),
            entry_path: "x.bin".to_string(),
            size: 3,
        }];
        let out = dir.path().join("out.cpio");
        CpioBundler
            .bundle(&fs, &elements, &Uri::parse(&out.to_string_lossy()), &|_| {})
            .unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(NEWC_MAGIC.as_bytes()));
        let trailer = TRAILER_NAME.as_bytes();
        assert!(bytes
            .windows(trailer.len())
            .any(|w| w == trailer));
        // Data region padded to 4 bytes throughout.
        assert_eq!(bytes.len() % 4, 0);
    }
}
