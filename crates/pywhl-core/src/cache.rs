//! Flat on-disk artifact cache.
//!
//! Every artifact lives at `<dir>/<key>-<sanitized filename>`, where the key
//! is derived from `(name, version, filename)` alone. A file only appears
//! under that name once a download completed; in-flight downloads write
//! `<path>.part` and are never cache hits.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local};
use pywhl_schema::hash::CACHE_KEY_LEN;
use pywhl_schema::{CacheKey, sanitize_filename};
use serde::Serialize;
use thiserror::Error;

/// Suffix of files still being written.
pub const PARTIAL_SUFFIX: &str = ".part";

#[derive(Error, Debug)]
#[error("cache I/O error at {}: {source}", path.display())]
pub struct CacheError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> CacheError + '_ {
    move |source| CacheError {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheEntry {
    /// `None` for files that do not follow the cache naming scheme.
    pub key: Option<String>,
    /// Sanitized original filename.
    pub filename: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: DateTime<Local>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanPolicy {
    All,
    OlderThan(Duration),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    /// Completed entries removed.
    pub removed: usize,
    /// Leftover `.part` files removed.
    pub partials: usize,
    pub freed_bytes: u64,
    /// Entries present before cleaning.
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// # Errors
    ///
    /// Fails when the directory cannot be created.
    pub fn ensure_dir(&self) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))
    }

    /// Deterministic location for an artifact, whether or not it exists yet.
    pub fn path(&self, name: &str, version: &str, filename: &str) -> PathBuf {
        let key = CacheKey::derive(name, version, filename);
        self.dir.join(format!("{key}-{}", sanitize_filename(filename)))
    }

    pub fn exists(&self, name: &str, version: &str, filename: &str) -> bool {
        self.path(name, version, filename).is_file()
    }

    /// Completed entries, newest first.
    ///
    /// # Errors
    ///
    /// Fails when the directory exists but cannot be read.
    pub fn list(&self) -> Result<Vec<CacheEntry>, CacheError> {
        let mut entries: Vec<CacheEntry> = self
            .files()?
            .into_iter()
            .filter(|(path, _)| !is_partial(path))
            .map(|(path, meta)| entry_for(path, &meta))
            .collect();
        entries.sort_by(|a, b| b.modified.cmp(&a.modified));
        Ok(entries)
    }

    /// # Errors
    ///
    /// See [`CacheStore::list`].
    pub fn total_size(&self) -> Result<u64, CacheError> {
        Ok(self.list()?.iter().map(|e| e.size).sum())
    }

    /// Remove entries. `All` also sweeps leftover partial downloads.
    /// Files that cannot be removed are logged and skipped.
    ///
    /// # Errors
    ///
    /// Fails when the directory cannot be read.
    pub fn clean(&self, policy: CleanPolicy) -> Result<CleanReport, CacheError> {
        let files = self.files()?;
        let cutoff = match policy {
            CleanPolicy::All => None,
            CleanPolicy::OlderThan(age) => {
                Some(SystemTime::now().checked_sub(age).unwrap_or(SystemTime::UNIX_EPOCH))
            }
        };

        let mut report = CleanReport {
            total: files.iter().filter(|(p, _)| !is_partial(p)).count(),
            ..CleanReport::default()
        };
        for (path, meta) in files {
            let expired = match cutoff {
                None => true,
                Some(cutoff) => !is_partial(&path) && meta.modified().is_ok_and(|m| m < cutoff),
            };
            if !expired {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "removed cache file");
                    if is_partial(&path) {
                        report.partials += 1;
                    } else {
                        report.removed += 1;
                    }
                    report.freed_bytes += meta.len();
                }
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove cache file"),
            }
        }
        Ok(report)
    }

    fn files(&self) -> Result<Vec<(PathBuf, std::fs::Metadata)>, CacheError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(&self.dir)(e)),
        };
        let mut files = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(io_err(&self.dir))?;
            let meta = entry.metadata().map_err(io_err(&entry.path()))?;
            if meta.is_file() {
                files.push((entry.path(), meta));
            }
        }
        Ok(files)
    }
}

fn is_partial(path: &Path) -> bool {
    path.to_string_lossy().ends_with(PARTIAL_SUFFIX)
}

fn entry_for(path: PathBuf, meta: &std::fs::Metadata) -> CacheEntry {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (key, filename) = match file_name.split_once('-') {
        Some((key, rest))
            if key.len() == CACHE_KEY_LEN && key.chars().all(|c| c.is_ascii_hexdigit()) =>
        {
            (Some(key.to_string()), rest.to_string())
        }
        _ => (None, file_name.clone()),
    };
    let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
    CacheEntry {
        key,
        filename,
        path,
        size: meta.len(),
        modified: DateTime::<Local>::from(modified),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, CacheStore) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("cache"));
        store.ensure_dir().unwrap();
        (dir, store)
    }

    #[test]
    fn test_path_is_stable() {
        let (_dir, store) = store();
        let a = store.path("six", "1.16.0", "six-1.16.0-py2.py3-none-any.whl");
        let b = store.path("six", "1.16.0", "six-1.16.0-py2.py3-none-any.whl");
        assert_eq!(a, b);
        let name = a.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("-six-1.16.0-py2.py3-none-any.whl"));
        assert_eq!(name.find('-'), Some(CACHE_KEY_LEN));
    }

    #[test]
    fn test_partial_file_is_not_a_hit() {
        let (_dir, store) = store();
        let path = store.path("a", "1.0.0", "a-1.0.0-py3-none-any.whl");
        let part = PathBuf::from(format!("{}{PARTIAL_SUFFIX}", path.display()));
        std::fs::write(&part, b"half").unwrap();
        assert!(!store.exists("a", "1.0.0", "a-1.0.0-py3-none-any.whl"));
        assert!(store.list().unwrap().is_empty());

        std::fs::rename(&part, &path).unwrap();
        assert!(store.exists("a", "1.0.0", "a-1.0.0-py3-none-any.whl"));
        let entries = store.list().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "a-1.0.0-py3-none-any.whl");
        assert_eq!(entries[0].size, 4);
        assert!(entries[0].key.is_some());
    }

    #[test]
    fn test_missing_dir_lists_empty() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("nope"));
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.total_size().unwrap(), 0);
        assert_eq!(store.clean(CleanPolicy::All).unwrap(), CleanReport::default());
    }

    #[test]
    fn test_clean_all() {
        let (_dir, store) = store();
        std::fs::write(store.path("a", "1", "a.whl"), vec![0u8; 10]).unwrap();
        std::fs::write(store.path("b", "1", "b.whl"), vec![0u8; 5]).unwrap();
        std::fs::write(store.dir().join("stale.whl.part"), b"x").unwrap();
        assert_eq!(store.total_size().unwrap(), 15);

        let report = store.clean(CleanPolicy::All).unwrap();
        assert_eq!(report.total, 2);
        assert_eq!(report.removed, 2);
        assert_eq!(report.partials, 1);
        assert_eq!(report.freed_bytes, 16);
        assert!(std::fs::read_dir(store.dir()).unwrap().next().is_none());
    }

    #[test]
    fn test_clean_older_than_keeps_fresh() {
        let (_dir, store) = store();
        std::fs::write(store.path("a", "1", "a.whl"), b"fresh").unwrap();
        let report = store
            .clean(CleanPolicy::OlderThan(Duration::from_secs(3600)))
            .unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(report.total, 1);
        assert!(store.exists("a", "1", "a.whl"));

        std::thread::sleep(Duration::from_millis(50));
        let report = store.clean(CleanPolicy::OlderThan(Duration::ZERO)).unwrap();
        assert_eq!(report.removed, 1);
    }
}
