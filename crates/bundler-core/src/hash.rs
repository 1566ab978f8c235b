//! Streaming digests over completed artifacts.

use std::io::{Read, Write};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

use bundler_fs::{FileSystems, Uri, VfsError, VfsResult};

use crate::types::HashType;

const HASH_BUFFER_SIZE: usize = 8192;

/// Digest a byte stream, lowercase hex output. Single pass, fixed buffer;
/// the input is never materialized.
pub fn hash_reader(
    mut reader: impl Read,
    algorithm: HashType,
) -> std::io::Result<String> {
    fn run<D: Digest>(reader: &mut impl Read) -> std::io::Result<String> {
        let mut hasher = D::new();
        let mut buf = [0u8; HASH_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(hex::encode(hasher.finalize()))
    }

    match algorithm {
        HashType::Md5 => run::<Md5>(&mut reader),
        HashType::Sha1 => run::<Sha1>(&mut reader),
        HashType::Sha256 => run::<Sha256>(&mut reader),
        HashType::Sha384 => run::<Sha384>(&mut reader),
        HashType::Sha512 => run::<Sha512>(&mut reader),
    }
}

/// Digest the artifact at `input` and return the hex string.
pub fn hash_file(fs: &FileSystems, input: &Uri, algorithm: HashType) -> VfsResult<String> {
    let (reader, _) = fs.open(input)?;
    hash_reader(reader, algorithm).map_err(|e| VfsError::TransientIo {
        uri: input.to_string(),
        message: e.to_string(),
    })
}

/// Digest `input` and write the hex string to `output` as a single UTF-8
/// line.
pub fn hash_file_to(
    fs: &FileSystems,
    input: &Uri,
    output: &Uri,
    algorithm: HashType,
) -> VfsResult<()> {
    let digest = hash_file(fs, input, algorithm)?;
    let mut writer = fs.create(output)?;
    writer
        .write_all(digest.as_bytes())
        .map_err(|e| VfsError::TransientIo {
            uri: output.to_string(),
            message: e.to_string(),
        })?;
    writer.finish()
}
