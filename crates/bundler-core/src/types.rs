//! Sum types shared across the pipeline. Each carries the canonical text
//! form used in JSON payloads and file paths.

use serde::{Deserialize, Serialize};

/// Lifecycle state shared by jobs, archives and file entries.
///
/// `NotAvailable` is a read-side placeholder for unknown job ids; it is
/// never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    NotStarted,
    InProgress,
    Complete,
    Error,
    InvalidRequest,
    NotAvailable,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::NotStarted => "NOT_STARTED",
            JobState::InProgress => "IN_PROGRESS",
            JobState::Complete => "COMPLETE",
            JobState::Error => "ERROR",
            JobState::InvalidRequest => "INVALID_REQUEST",
            JobState::NotAvailable => "NOT_AVAILABLE",
        }
    }

    pub fn parse(text: &str) -> Option<JobState> {
        match text {
            "NOT_STARTED" => Some(JobState::NotStarted),
            "IN_PROGRESS" => Some(JobState::InProgress),
            "COMPLETE" => Some(JobState::Complete),
            "ERROR" => Some(JobState::Error),
            "INVALID_REQUEST" => Some(JobState::InvalidRequest),
            "NOT_AVAILABLE" => Some(JobState::NotAvailable),
            _ => None,
        }
    }

    /// COMPLETE and ERROR are terminal; nothing mutates a row past them.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Complete | JobState::Error)
    }
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArchiveType {
    Zip,
    Tar,
    Ar,
    Cpio,
    Gzip,
    Bzip2,
}

impl ArchiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveType::Zip => "ZIP",
            ArchiveType::Tar => "TAR",
            ArchiveType::Ar => "AR",
            ArchiveType::Cpio => "CPIO",
            ArchiveType::Gzip => "GZIP",
            ArchiveType::Bzip2 => "BZIP2",
        }
    }

    /// Case-insensitive parse of the request's `type` field.
    pub fn parse(text: &str) -> Option<ArchiveType> {
        match text.trim().to_ascii_uppercase().as_str() {
            "ZIP" => Some(ArchiveType::Zip),
            "TAR" => Some(ArchiveType::Tar),
            "AR" => Some(ArchiveType::Ar),
            "CPIO" => Some(ArchiveType::Cpio),
            "GZIP" => Some(ArchiveType::Gzip),
            "BZIP2" => Some(ArchiveType::Bzip2),
            _ => None,
        }
    }

    /// File extension of the final artifact.
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveType::Zip => "zip",
            ArchiveType::Tar => "tar",
            ArchiveType::Ar => "ar",
            ArchiveType::Cpio => "cpio",
            ArchiveType::Gzip => "tar.gz",
            ArchiveType::Bzip2 => "tar.bz2",
        }
    }

    /// Whether the container itself compresses entry data. Drives the
    /// size estimator.
    pub fn is_compressed(&self) -> bool {
        matches!(
            self,
            ArchiveType::Zip | ArchiveType::Gzip | ArchiveType::Bzip2
        )
    }
}

/// Digest algorithm for the sibling hash file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashType {
    Md5,
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashType::Md5 => "MD5",
            HashType::Sha1 => "SHA1",
            HashType::Sha256 => "SHA256",
            HashType::Sha384 => "SHA384",
            HashType::Sha512 => "SHA512",
        }
    }

    pub fn parse(text: &str) -> Option<HashType> {
        match text.trim().to_ascii_uppercase().as_str() {
            "MD5" => Some(HashType::Md5),
            "SHA1" | "SHA-1" => Some(HashType::Sha1),
            "SHA256" | "SHA-256" => Some(HashType::Sha256),
            "SHA384" | "SHA-384" => Some(HashType::Sha384),
            "SHA512" | "SHA-512" => Some(HashType::Sha512),
            _ => None,
        }
    }
}

impl Default for HashType {
    fn default() -> Self {
        HashType::Sha1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archive_type_parse_is_case_insensitive() {
        assert_eq!(ArchiveType::parse("zip"), Some(ArchiveType::Zip));
        assert_eq!(ArchiveType::parse(" Bzip2 "), Some(ArchiveType::Bzip2));
        assert_eq!(ArchiveType::parse("rar"), None);
    }

    #[test]
    fn job_state_round_trips_text() {
        for state in [
            JobState::NotStarted,
            JobState::InProgress,
            JobState::Complete,
            JobState::Error,
            JobState::InvalidRequest,
            JobState::NotAvailable,
        ] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
    }

    #[test]
    fn json_text_forms_match_contract() {
        assert_eq!(
            serde_json::to_string(&JobState::InvalidRequest).unwrap(),
            "\"INVALID_REQUEST\""
        );
        assert_eq!(
            serde_json::to_string(&ArchiveType::Gzip).unwrap(),
            "\"GZIP\""
        );
    }

    #[test]
    fn compressed_extension_is_two_part() {
        assert_eq!(ArchiveType::Gzip.extension(), "tar.gz");
        assert_eq!(ArchiveType::Bzip2.extension(), "tar.bz2");
        assert!(!ArchiveType::Tar.is_compressed());
    }
}
