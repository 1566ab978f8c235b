//! Unix `ar` container.
//!
//! The common (System V) format: `!<arch>\n` magic, then a 60-byte ASCII
//! header per member followed by the data, 2-byte aligned. Member names
//! must fit the 16-byte header field; longer names fail the entry, as the
//! format offers no portable long-name story worth carrying here.

use std::io::{BufWriter, Write};

use tracing::debug;

use bundler_fs::{FileSystems, Uri};

use crate::model::{now_millis, ArchiveElement};
use crate::types::ArchiveType;

use super::{
    enforce_extension, open_element, remove_existing, ArchiveError, Bundler, OnEntryComplete,
};

const AR_MAGIC: &[u8] = b"!<arch>\n";
const AR_NAME_LIMIT: usize = 16;

pub struct ArBundler;

impl Bundler for ArBundler {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Ar
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
        debug!(output = %output, entries = elements.len(), "creating ar archive");

        let sink = fs.create(&output)?;
        let mut writer = BufWriter::new(sink);
        writer
            .write_all(AR_MAGIC)
            .map_err(|e| ArchiveError::io(&output, e))?;
        let mtime = now_millis() / 1000;

        for element in elements {
            let header = member_header(&element.entry_path, element.size, mtime)?;
            let (mut reader, _) = open_element(fs, element)?;
            writer
                .write_all(&header)
                .map_err(|e| ArchiveError::io(&output, e))?;
            let written = std::io::copy(&mut reader, &mut writer)
                .map_err(|e| ArchiveError::io(&element.uri, e))?;
            if written % 2 == 1 {
                writer
                    .write_all(b"\n")
                    .map_err(|e| ArchiveError::io(&output, e))?;
            }
            on_entry(element);
        }

        let mut sink = writer
            .into_inner()
            .map_err(|e| ArchiveError::io(&output, e.error()))?;
        sink.finish()?;
        Ok(())
    }
}

/// 60-byte member header: name(16) mtime(12) uid(6) gid(6) mode(8)
/// size(10) terminator(2), space padded. The name field is sized in
/// bytes, so it is written as raw bytes rather than through a char-width
/// format.
fn member_header(name: &str, size: u64, mtime: i64) -> Result<Vec<u8>, ArchiveError> {
    let name_bytes = name.as_bytes();
    if name_bytes.len() > AR_NAME_LIMIT {
        return Err(ArchiveError::UnsupportedEntry {
            entry: name.to_string(),
            format: "ar",
            reason: format!("member name exceeds {AR_NAME_LIMIT} bytes"),
        });
    }
    let mut header = Vec::with_capacity(60);
    header.extend_from_slice(name_bytes);
    header.resize(AR_NAME_LIMIT, b' ');
    header.extend_from_slice(format!("{mtime:<12}").as_bytes());
    header.extend_from_slice(format!("{:<6}", 0).as_bytes());
    header.extend_from_slice(format!("{:<6}", 0).as_bytes());
    header.extend_from_slice(format!("{:<8o}", 0o644).as_bytes());
    header.extend_from_slice(format!("{size:<10}").as_bytes());
    header.extend_from_slice(b"`\n");
    debug_assert_eq!(header.len(), 60);
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout_is_sixty_bytes() {
        let header = member_header("a.txt", 5, 1_700_000_000).unwrap();
        assert_eq!(header.len(), 60);
        assert_eq!(&header[..16], format!("{:<16}", "a.txt").as_bytes());
        assert_eq!(&header[16..28], format!("{:<12}", 1_700_000_000u64).as_bytes());
        assert_eq!(&header[48..58], format!("{:<10}", 5).as_bytes());
        assert!(header.ends_with(b"`\n"));
    }

    #[test]
    fn long_member_name_is_rejected() {
        let err = member_header("a_very_long_member_name.bin", 1, 0).unwrap_err();
        assert!(matches!(err, ArchiveError::UnsupportedEntry { .. }));
    }

    #[test]
    fn multibyte_name_keeps_the_byte_layout() {
        // "café.bin" is 8 chars but 9 bytes; the name field must still be
        // exactly 16 bytes.
        let header = member_header("caf\u{e9}.bin", 1, 0).unwrap();
        assert_eq!(header.len(), 60);
        let mut expected = "caf\u{e9}.bin".as_bytes().to_vec();
        expected.resize(16, b' ');
        assert_eq!(&header[..16], expected.as_slice());

        // A name of 16 bytes (but fewer chars) is accepted; 17 bytes is
        // not.
        assert!(member_header("\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}", 1, 0).is_ok());
        assert!(member_header("x\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}\u{e9}", 1, 0).is_err());
    }

    #[test]
    fn archive_has_magic_and_padded_members() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystems::with_local();
        let src = dir.path().join("odd.bin");
        std::fs::write(&src, b"12345").unwrap();

        let elements = vec![ArchiveElement {
            uri: Uri::parse(&src.to_string_lossy()),
            entry_path: "odd.bin".to_string(),
            size: 5,
        }];
        let out = dir.path().join("out.ar");
        ArBundler
            .bundle(&fs, &elements, &Uri::parse(&out.to_string_lossy()), &|_| {})
            .unwrap();

        let bytes = std::fs::read(&out).unwrap();
        assert!(bytes.starts_with(AR_MAGIC));
        // magic + header + 5 data bytes + 1 alignment byte
        assert_eq!(bytes.len(), 8 + 60 + 5 + 1);
        assert_eq!(bytes.last(), Some(&b'\n'));
    }
}
