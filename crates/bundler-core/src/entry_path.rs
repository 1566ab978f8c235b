//! Entry-path computation.
//!
//! The entry path is the location a source file is stored under inside an
//! output archive. Starting from the source URI's path component:
//!
//! 1. each configured prefix exclusion is stripped (one occurrence),
//! 2. a caller-supplied base directory is stripped from the front,
//! 3. a caller-supplied archive path is prepended with exactly one `/`,
//! 4. any leading separator is removed,
//! 5. the 100-character limit is enforced: leftmost path segments are
//!    dropped while one remains, then the filename is truncated with its
//!    extension preserved.

use tracing::warn;

use bundler_fs::Uri;

/// An output entry path cannot be longer than this many characters.
pub const ENTRY_PATH_LENGTH_LIMIT: usize = 100;

/// Normalizer configured with the process-wide prefix-exclusion list.
#[derive(Debug, Clone, Default)]
pub struct EntryPaths {
    exclusions: Vec<String>,
}

impl EntryPaths {
    pub fn new(exclusions: Vec<String>) -> EntryPaths {
        EntryPaths {
            exclusions: exclusions.into_iter().filter(|e| !e.is_empty()).collect(),
        }
    }

    /// Entry path for a standalone file.
    pub fn entry_path(&self, uri: &Uri) -> String {
        self.entry_path_for(uri, None, None)
    }

    /// Entry path for a file found under `base_dir`, optionally relocated
    /// beneath `archive_path` inside the archive.
    pub fn entry_path_for(
        &self,
        uri: &Uri,
        base_dir: Option<&str>,
        archive_path: Option<&str>,
    ) -> String {
        let mut path = uri.path().to_string();
        if path.is_empty() {
            warn!(uri = %uri, "URI has no path component, entry path is empty");
            return path;
        }

        for exclusion in &self.exclusions {
            if let Some(rest) = path.strip_prefix(exclusion.as_str()) {
                path = rest.to_string();
            }
        }

        if let Some(base) = base_dir.filter(|b| !b.is_empty()) {
            if let Some(rest) = path.strip_prefix(base) {
                path = rest.to_string();
            }
        }

        if let Some(prefix) = archive_path.filter(|p| !p.is_empty()) {
            let prefix = prefix.trim_end_matches('/');
            let rest = path.trim_start_matches('/');
            path = format!("{prefix}/{rest}");
        }

        path = path.trim_start_matches('/').to_string();
        enforce_length_limit(path)
    }
}

/// Shorten a candidate path to the limit: drop leftmost segments while a
/// separator remains, then truncate the filename keeping its extension.
fn enforce_length_limit(mut path: String) -> String {
    while path.chars().count() > ENTRY_PATH_LENGTH_LIMIT {
        if let Some(slash) = path.find('/') {
            path = path[slash + 1..].to_string();
        } else {
            path = truncate_filename(&path);
        }
    }
    path
}

/// The dot-suffix after the last `.`, when it falls after the last `/`
/// and is not the first character of the name. Includes the dot.
fn extension(path: &str) -> &str {
    let Some(dot) = path.rfind('.') else {
        return "";
    };
    let dir = path.rfind('/');
    match dir {
        None if dot == 0 => "",
        Some(d) if d > dot => "",
        _ => &path[dot..],
    }
}

fn truncate_filename(path: &str) -> String {
    let ext = extension(path);
    let ext_len = ext.chars().count();
    if ext_len >= ENTRY_PATH_LENGTH_LIMIT {
        return path.chars().take(ENTRY_PATH_LENGTH_LIMIT).collect();
    }
    let stem_end = path.chars().count() - ext_len;
    let stem: String = path
        .chars()
        .take(stem_end.min(ENTRY_PATH_LENGTH_LIMIT - ext_len))
        .collect();
    format!("{stem}{ext}")
}
