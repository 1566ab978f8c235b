//! TAR container.

use std::io::BufWriter;

use tracing::debug;

use bundler_fs::{FileSystems, Uri};

use crate::model::{now_millis, ArchiveElement};
use crate::types::ArchiveType;

use super::{
    enforce_extension, open_element, remove_existing, ArchiveError, Bundler, OnEntryComplete,
};

pub struct TarBundler;

impl Bundler for TarBundler {
    fn archive_type(&self) -> ArchiveType {
        ArchiveType::Tar
    }

    fn bundle(
        &self,
        fs: &FileSystems,
        elements: &[ArchiveElement],
        output: &Uri,
        on_entry: OnEntryComplete,
    ) -> Result<(), ArchiveError> {
        let output = enforce_extension(output, self.archive_type().extension());
        write_tar(fs, elements, &output, on_entry)
    }
}

/// Shared by the plain TAR bundler and the compressed variants' first
/// pass.
pub(crate) fn write_tar(
    fs: &FileSystems,
    elements: &[ArchiveElement],
    output: &Uri,
    on_entry: OnEntryComplete,
) -> Result<(), ArchiveError> {
    remove_existing(fs, output)?;
    debug!(output = %output, entries = elements.len(), "creating tar archive");

    let sink = fs.create(output)?;
    let mut builder = tar::Builder::new(BufWriter::new(sink));
    let mtime = (now_millis() / 1000) as u64;

    for element in elements {
        let (mut reader, size) = open_element(fs, element)?;
        let mut header = tar::Header::new_gnu();
        header.set_size(size);
        header.set_mode(0o644);
        header.set_mtime(mtime);
        builder
            .append_data(&mut header, &element.entry_path, &mut reader)
            .map_err(|e| ArchiveError::io(&element.uri, e))?;
        on_entry(element);
    }

    let buffered = builder
        .into_inner()
        .map_err(|e| ArchiveError::io(output, e))?;
    let mut sink = buffered
        .into_inner()
        .map_err(|e| ArchiveError::io(output, e.error()))?;
    sink.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Bundler;
    use std::io::Read;

    fn element(dir: &std::path::Path, name: &str, contents: &[u8]) -> ArchiveElement {
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        ArchiveElement {
            uri: Uri::parse(&path.to_string_lossy()),
            entry_path: format!("in/{name}"),
            size: contents.len() as u64,
        }
    }

    #[test]
    fn entries_stream_in_input_order() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystems::with_local();
        let elements = vec![
            element(dir.path(), "b.txt", b"bravo"),
            element(dir.path(), "a.txt", b"alpha"),
        ];
        let output = Uri::parse(&dir.path().join("out.tar").to_string_lossy());

        let seen = std::sync::Mutex::new(Vec::new());
        TarBundler
            .bundle(&fs, &elements, &output, &|e: &ArchiveElement| {
                seen.lock().unwrap().push(e.entry_path.clone());
            })
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["in/b.txt", "in/a.txt"]);

        let mut archive = tar::Archive::new(std::fs::File::open(dir.path().join("out.tar")).unwrap());
        let mut names = Vec::new();
        let mut payloads = Vec::new();
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            names.push(entry.path().unwrap().to_string_lossy().into_owned());
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            payloads.push(data);
        }
        assert_eq!(names, vec!["in/b.txt", "in/a.txt"]);
        assert_eq!(payloads, vec![b"bravo".to_vec(), b"alpha".to_vec()]);
    }

    #[test]
    fn stale_output_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystems::with_local();
        let out_path = dir.path().join("out.tar");
        std::fs::write(&out_path, b"stale garbage").unwrap();

        let elements = vec![element(dir.path(), "x.txt", b"fresh")];
        TarBundler
            .bundle(
                &fs,
                &elements,
                &Uri::parse(&out_path.to_string_lossy()),
                &|_| {},
            )
            .unwrap();

        let mut archive = tar::Archive::new(std::fs::File::open(&out_path).unwrap());
        assert_eq!(archive.entries().unwrap().count(), 1);
    }

    #[test]
    fn missing_source_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let fs = FileSystems::with_local();
        let elements = vec![ArchiveElement {
            uri: Uri::parse("/no/such/source.bin"),
            entry_path: "source.bin".to_string(),
            size: 4,
        }];
        let output = Uri::parse(&dir.path().join("out.tar").to_string_lossy());
        let err = TarBundler.bundle(&fs, &elements, &output, &|_| {});
        assert!(err.is_err());
    }
}
