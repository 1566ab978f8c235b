//! Process configuration. Loaded once at startup from a TOML file and
//! treated as immutable afterwards.

use std::path::Path;

use serde::Deserialize;

use crate::types::HashType;

pub const DEFAULT_SERVER_NAME: &str = "bundler";
/// Default artifact name template when the request supplies none.
pub const DEFAULT_FILENAME_TEMPLATE: &str = "nga_data_archive";
/// Hard cap on configured entry-path prefix exclusions.
pub const MAX_NUM_EXCLUSIONS: usize = 100;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

fn default_staging_directory() -> String {
    std::env::temp_dir().to_string_lossy().into_owned()
}

fn default_base_url() -> String {
    "http://localhost/bundles".to_string()
}

fn default_min_archive_size() -> u64 {
    20
}

fn default_max_archive_size() -> u64 {
    400
}

fn default_archive_size() -> u64 {
    200
}

fn default_compression_percentage() -> u64 {
    30
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_database_file() -> String {
    "bundler.db".to_string()
}

/// Every recognized configuration key, with a default. Sizes are MB.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BundlerConfig {
    /// Root under which `<job_id>/` output directories are created.
    pub staging_directory: String,
    /// Prefix replacing the staging root when artifact paths are turned
    /// into HTTP URLs.
    pub base_url: String,
    /// Leading substrings stripped from entry paths.
    pub entry_path_exclusions: Vec<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: Option<String>,
    pub iam_role: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub min_archive_size: u64,
    pub max_archive_size: u64,
    pub default_archive_size: u64,
    /// Estimator constant, percent shaved off compressible input.
    pub average_compression_percentage: u64,
    /// Optional directory for debug archival of raw requests.
    pub bundle_request_directory: Option<String>,
    pub bind_address: String,
    pub database_file: String,
    pub hash_type: HashType,
}

impl Default for BundlerConfig {
    fn default() -> Self {
        BundlerConfig {
            staging_directory: default_staging_directory(),
            base_url: default_base_url(),
            entry_path_exclusions: Vec::new(),
            s3_endpoint: None,
            s3_region: None,
            iam_role: None,
            access_key: None,
            secret_key: None,
            min_archive_size: default_min_archive_size(),
            max_archive_size: default_max_archive_size(),
            default_archive_size: default_archive_size(),
            average_compression_percentage: default_compression_percentage(),
            bundle_request_directory: None,
            bind_address: default_bind_address(),
            database_file: default_database_file(),
            hash_type: HashType::default(),
        }
    }
}

impl BundlerConfig {
    pub fn load(path: &Path) -> Result<BundlerConfig, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut config: BundlerConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::Parse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.entry_path_exclusions.truncate(MAX_NUM_EXCLUSIONS);
        Ok(config)
    }

    /// Clamp a requested archive size (MB) into the configured window and
    /// convert to bytes. Zero or absent requests take the default.
    pub fn target_archive_size_bytes(&self, requested_mb: u64) -> u64 {
        let requested = if requested_mb == 0 {
            self.default_archive_size
        } else {
            requested_mb
        };
        requested.clamp(self.min_archive_size, self.max_archive_size) * BYTES_PER_MEGABYTE
    }

    /// Estimator constant, clamped into 0..=100.
    pub fn compression_percentage(&self) -> u64 {
        self.average_compression_percentage.min(100)
    }

    pub fn s3_config(&self) -> bundler_fs::S3Config {
        bundler_fs::S3Config {
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            iam_role: self.iam_role.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
}
