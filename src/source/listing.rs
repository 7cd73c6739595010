//! Discovery of delimited files in a directory tree.
//!
//! Finds files with a recognized plain or compressed delimited-text suffix,
//! drops those not modified within a recency window, and orders the rest
//! most-recently-modified first.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use snafu::prelude::*;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::error::{DiscoveryError, WalkSnafu};

/// Suffixes of files that can be tailed.
pub const DELIMITED_SUFFIXES: &[&str] = &[".csv", ".csv.gz", ".csv.gzip", ".csv.bz2", ".csv.zst"];

/// Whether `path` has one of the [`DELIMITED_SUFFIXES`], ignoring case.
pub fn is_delimited_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_ascii_lowercase)
        .is_some_and(|name| DELIMITED_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)))
}

/// Recursively list delimited files under `dir`, most recently modified first.
///
/// With `changed_since`, files not modified within that window are dropped.
pub fn find_latest_files(
    dir: &Path,
    changed_since: Option<Duration>,
) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.context(WalkSnafu { dir })?;
        if entry.file_type().is_file() && is_delimited_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    debug!(dir = %dir.display(), count = files.len(), "Found delimited files");
    Ok(sort_and_limit_files(files, changed_since))
}

/// Sort by modification time, newest first, dropping files older than
/// `changed_since`. Files whose metadata can't be read are dropped.
pub fn sort_and_limit_files(files: Vec<PathBuf>, changed_since: Option<Duration>) -> Vec<PathBuf> {
    let cutoff = changed_since.and_then(|window| SystemTime::now().checked_sub(window));

    let mut stamped: Vec<(PathBuf, SystemTime)> = files
        .into_iter()
        .filter_map(|path| match path.metadata().and_then(|m| m.modified()) {
            Ok(modified) => Some((path, modified)),
            Err(e) => {
                trace!(path = %path.display(), error = %e, "Skipping file without mtime");
                None
            }
        })
        .filter(|(_, modified)| cutoff.is_none_or(|cutoff| *modified > cutoff))
        .collect();

    stamped.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    stamped.into_iter().map(|(path, _)| path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CompressionFormat;
    use std::fs::File;
    use tempfile::TempDir;

    fn touch(path: &Path, modified: SystemTime) {
        let file = File::options()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        file.set_modified(modified).unwrap();
    }

    #[test]
    fn test_is_delimited_file() {
        assert!(is_delimited_file(Path::new("a.csv")));
        assert!(is_delimited_file(Path::new("dir/a.csv.gz")));
        assert!(is_delimited_file(Path::new("a.csv.bz2")));
        assert!(is_delimited_file(Path::new("a.csv.zst")));
        assert!(!is_delimited_file(Path::new("a.txt")));
        assert!(!is_delimited_file(Path::new("a.gz")));
    }

    #[test]
    fn test_is_delimited_file_ignores_case() {
        assert!(is_delimited_file(Path::new("X.CSV.GZ")));
        assert!(is_delimited_file(Path::new("Data.Csv")));
        assert!(is_delimited_file(Path::new("a.csv.gzip")));
        assert_eq!(
            CompressionFormat::from_path(Path::new("X.CSV.GZ")),
            CompressionFormat::Gzip
        );
    }

    #[test]
    fn test_sort_newest_first() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        let a = dir.path().join("a.csv");
        let b = dir.path().join("b.csv.gz");
        let c = dir.path().join("c.csv");
        touch(&a, now - Duration::from_secs(30));
        touch(&b, now - Duration::from_secs(20));
        touch(&c, now - Duration::from_secs(10));

        let sorted = sort_and_limit_files(vec![a.clone(), b.clone(), c.clone()], None);
        assert_eq!(sorted, vec![c.clone(), b.clone(), a.clone()]);

        touch(&b, now);
        let sorted = sort_and_limit_files(sorted, None);
        assert_eq!(sorted, vec![b, c, a]);
    }

    #[test]
    fn test_recency_window_drops_old_files() {
        let dir = TempDir::new().unwrap();
        let now = SystemTime::now();
        let fresh = dir.path().join("fresh.csv");
        let stale = dir.path().join("stale.csv");
        touch(&fresh, now);
        touch(&stale, now - Duration::from_secs(2 * 60 * 60));

        let kept = sort_and_limit_files(
            vec![fresh.clone(), stale, dir.path().join("missing.csv")],
            Some(Duration::from_secs(60 * 60)),
        );
        assert_eq!(kept, vec![fresh]);
    }

    #[test]
    fn test_find_latest_files_recurses() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("run1");
        std::fs::create_dir_all(&nested).unwrap();
        let now = SystemTime::now();
        touch(&dir.path().join("top.csv"), now - Duration::from_secs(5));
        touch(&nested.join("deep.csv.bz2"), now);
        touch(&dir.path().join("notes.txt"), now);

        let found = find_latest_files(dir.path(), None).unwrap();
        assert_eq!(
            found,
            vec![nested.join("deep.csv.bz2"), dir.path().join("top.csv")]
        );
    }

    #[test]
    fn test_find_latest_files_missing_dir() {
        let dir = TempDir::new().unwrap();
        let result = find_latest_files(&dir.path().join("nope"), None);
        assert!(matches!(result, Err(DiscoveryError::Walk { .. })));
    }
}
