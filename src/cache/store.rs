//! Local cache store keyed by canonical per-attachment paths.
//!
//! The canonical filename is a deterministic function of the
//! attachment's creation date, id, and original filename:
//!
//! ```text
//! source_<YYYY><MM><DD>_<id>_<filename>
//! ```
//!
//! Presence of a file at the canonical path is the idempotence marker:
//! the attachment was fully processed by a prior run and must not be
//! re-downloaded (downloads are atomic-rename, so partial files never
//! occupy canonical paths).

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Datelike;

use crate::core::errors::{Result, TriageError};
use crate::registry::record::AttachmentRecord;

/// Cache store rooted at a configured directory.
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store over `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| TriageError::io(&root, source))?;
        Ok(Self { root })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical path for a record.
    ///
    /// Errors when the record carries no creation timestamp — the date
    /// is part of the cache key and cannot be substituted.
    pub fn canonical_path(&self, record: &AttachmentRecord) -> Result<PathBuf> {
        let created = record
            .created_at
            .ok_or_else(|| TriageError::RecordInvalid {
                details: format!(
                    "attachment {} has no creation timestamp; cannot derive cache path",
                    record.id
                ),
            })?;
        let name = format!(
            "source_{}{:02}{:02}_{}_{}",
            created.year(),
            created.month(),
            created.day(),
            record.id,
            record.filename
        );
        Ok(self.root.join(name))
    }

    /// Whether a file exists at `path`.
    #[must_use]
    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Write `bytes` to `path`.
    pub fn write(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::write(path, bytes).map_err(|source| TriageError::io(path, source))
    }

    /// Byte size of the file at `path`.
    pub fn size(&self, path: &Path) -> Result<u64> {
        let meta = fs::metadata(path).map_err(|source| TriageError::io(path, source))?;
        Ok(meta.len())
    }

    /// Read the full content of the file at `path`.
    pub fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).map_err(|source| TriageError::io(path, source))
    }

    /// Remove the file at `path`.
    ///
    /// An out-of-space condition surfaces as the fatal
    /// [`TriageError::StorageFull`]; every other failure is a plain
    /// [`TriageError::Io`] the caller may log and skip.
    pub fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path).map_err(|source| TriageError::io(path, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn record(id: i64, filename: &str, y: i32, m: u32, d: u32) -> AttachmentRecord {
        AttachmentRecord::new(
            id,
            filename,
            Utc.with_ymd_and_hms(y, m, d, 10, 0, 0).unwrap(),
        )
    }

    #[test]
    fn canonical_path_zero_pads_month_and_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let path = store
            .canonical_path(&record(1717073, "shot.mb", 2021, 3, 7))
            .unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "source_20210307_1717073_shot.mb"
        );
    }

    #[test]
    fn canonical_path_requires_creation_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let mut rec = record(5, "a.mb", 2021, 5, 1);
        rec.created_at = None;
        let err = store.canonical_path(&rec).expect_err("expected rejection");
        assert_eq!(err.code(), "ATG-2003");
    }

    #[test]
    fn write_exists_size_remove_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let path = store
            .canonical_path(&record(9, "scene.ma", 2021, 5, 12))
            .unwrap();

        assert!(!store.exists(&path));
        store.write(&path, b"file body").unwrap();
        assert!(store.exists(&path));
        assert_eq!(store.size(&path).unwrap(), 9);
        assert_eq!(store.read(&path).unwrap(), b"file body");
        store.remove(&path).unwrap();
        assert!(!store.exists(&path));
    }

    #[test]
    fn remove_missing_file_is_io_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::open(dir.path()).unwrap();
        let err = store
            .remove(&dir.path().join("never_written.mb"))
            .expect_err("expected failure");
        assert_eq!(err.code(), "ATG-3002");
        assert!(!err.is_fatal());
    }

    #[test]
    fn open_creates_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a/b/cache");
        let store = CacheStore::open(&nested).unwrap();
        assert!(store.root().is_dir());
    }

    proptest! {
        #[test]
        fn canonical_path_is_deterministic(
            id in 1i64..=i64::from(u32::MAX),
            name in "[a-z]{1,12}\\.(mb|ma)",
            year in 2000i32..=2100,
            month in 1u32..=12,
            day in 1u32..=28,
        ) {
            let dir = tempfile::tempdir().unwrap();
            let store = CacheStore::open(dir.path()).unwrap();
            let rec = record(id, &name, year, month, day);
            let first = store.canonical_path(&rec).unwrap();
            let second = store.canonical_path(&rec).unwrap();
            prop_assert_eq!(&first, &second);
            let file_name = first.file_name().unwrap().to_str().unwrap().to_owned();
            prop_assert_eq!(
                file_name,
                format!("source_{year}{month:02}{day:02}_{id}_{name}")
            );
        }
    }
}
