//! Quarantine index: the append-only external record of detections.
//!
//! The in-memory index maps the base filename of a cached copy to a
//! sanitized attachment record. On every detection the index is
//! appended to the external store — intentionally redundant, so a
//! crash after any detection leaves the most complete index written so
//! far.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, TriageError};
use crate::registry::record::AttachmentRecord;

/// On-disk format of index appends.
///
/// `Snapshot` preserves the reference deployment's quirk: a
/// pretty-printed (4-space) JSON object of the whole index is appended
/// per detection, so the file accumulates concatenated documents.
/// `Jsonl` appends one single-line object per detection instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexFormat {
    /// Concatenated pretty-printed documents (reference-compatible).
    #[default]
    Snapshot,
    /// One single-line JSON object per detection.
    Jsonl,
}

/// In-memory quarantine index for one run.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct QuarantineIndex {
    #[serde(flatten)]
    entries: BTreeMap<String, AttachmentRecord>,
}

impl QuarantineIndex {
    /// Merge a sanitized record, keyed by the base filename of its
    /// cached copy.
    ///
    /// Returns the key, and whether the entry was newly inserted
    /// (false means the same cached file was already indexed this run).
    pub fn merge(&mut self, record: AttachmentRecord) -> (String, bool) {
        let key = record
            .source_file
            .as_deref()
            .map(base_name)
            .unwrap_or_else(|| record.filename.clone());
        let fresh = self.entries.insert(key.clone(), record).is_none();
        (key, fresh)
    }

    /// Entry stored under `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttachmentRecord> {
        self.entries.get(key)
    }

    /// Number of detections recorded this run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no detection has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AttachmentRecord)> {
        self.entries.iter()
    }
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_string(), |name| name.to_string_lossy().into_owned())
}

/// Appends the index to the external store.
#[derive(Debug, Clone)]
pub struct IndexWriter {
    path: PathBuf,
    format: IndexFormat,
}

impl IndexWriter {
    /// Writer targeting `path` in the given format.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, format: IndexFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Target path of the external store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the current index state after a detection.
    ///
    /// `latest_key` names the entry that triggered this append; the
    /// JSONL format persists only that entry, the snapshot format
    /// persists the whole index.
    pub fn append(&self, index: &QuarantineIndex, latest_key: &str) -> Result<()> {
        let payload = match self.format {
            IndexFormat::Snapshot => {
                let mut buf = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
                let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
                index.serialize(&mut serializer)?;
                buf.push(b'\n');
                buf
            }
            IndexFormat::Jsonl => {
                let entry = index.get(latest_key).ok_or_else(|| {
                    TriageError::Serialization {
                        context: "quarantine index",
                        details: format!("no entry under key {latest_key:?}"),
                    }
                })?;
                let object = serde_json::json!({ latest_key: entry });
                let mut buf = serde_json::to_vec(&object)?;
                buf.push(b'\n');
                buf
            }
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| TriageError::io(parent, source))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| TriageError::io(&self.path, source))?;
        file.write_all(&payload)
            .map_err(|source| TriageError::io(&self.path, source))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sanitized(id: i64, filename: &str) -> AttachmentRecord {
        let record = AttachmentRecord::new(
            id,
            filename,
            Utc.with_ymd_and_hms(2021, 5, 12, 8, 0, 0).unwrap(),
        );
        let cached = format!("/cache/source_20210512_{id}_{filename}");
        record.sanitized_for_index(Path::new(&cached))
    }

    #[test]
    fn merge_keys_by_cached_base_filename() {
        let mut index = QuarantineIndex::default();
        let (key, fresh) = index.merge(sanitized(42, "scene.mb"));
        assert_eq!(key, "source_20210512_42_scene.mb");
        assert!(fresh);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(&key).unwrap().source_file_id, Some(42));
    }

    #[test]
    fn merge_same_attachment_twice_is_not_fresh() {
        let mut index = QuarantineIndex::default();
        index.merge(sanitized(42, "scene.mb"));
        let (_, fresh) = index.merge(sanitized(42, "scene.mb"));
        assert!(!fresh);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn snapshot_append_accumulates_pretty_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source_files.json");
        let writer = IndexWriter::new(&path, IndexFormat::Snapshot);

        let mut index = QuarantineIndex::default();
        let (k1, _) = index.merge(sanitized(1, "a.mb"));
        writer.append(&index, &k1).unwrap();
        let (k2, _) = index.merge(sanitized(2, "b.ma"));
        writer.append(&index, &k2).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        // Two concatenated pretty-printed documents; not one valid doc.
        assert!(serde_json::from_str::<serde_json::Value>(&contents).is_err());
        assert_eq!(contents.matches("source_20210512_1_a.mb").count(), 2);
        assert_eq!(contents.matches("source_20210512_2_b.ma").count(), 1);
        // 4-space indentation, as the reference deployment wrote it.
        assert!(contents.contains("\n    \"source_20210512_1_a.mb\""));
    }

    #[test]
    fn jsonl_append_writes_one_entry_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source_files.jsonl");
        let writer = IndexWriter::new(&path, IndexFormat::Jsonl);

        let mut index = QuarantineIndex::default();
        let (k1, _) = index.merge(sanitized(1, "a.mb"));
        writer.append(&index, &k1).unwrap();
        let (k2, _) = index.merge(sanitized(2, "b.ma"));
        writer.append(&index, &k2).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert!(first.get("source_20210512_1_a.mb").is_some());
        assert!(first.get("source_20210512_2_b.ma").is_none());
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(
            second["source_20210512_2_b.ma"]["source_file_id"],
            serde_json::json!(2)
        );
    }

    #[test]
    fn entries_never_rewritten_by_later_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let writer = IndexWriter::new(&path, IndexFormat::Snapshot);

        let mut index = QuarantineIndex::default();
        let (k1, _) = index.merge(sanitized(1, "a.mb"));
        writer.append(&index, &k1).unwrap();
        let before = fs::read_to_string(&path).unwrap();

        let (k2, _) = index.merge(sanitized(2, "b.ma"));
        writer.append(&index, &k2).unwrap();
        let after = fs::read_to_string(&path).unwrap();

        assert!(
            after.starts_with(&before),
            "append must only ever grow the file"
        );
    }

    #[test]
    fn append_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep/nested/index.json");
        let writer = IndexWriter::new(&path, IndexFormat::Snapshot);

        let mut index = QuarantineIndex::default();
        let (key, _) = index.merge(sanitized(1, "a.mb"));
        writer.append(&index, &key).unwrap();
        assert!(path.is_file());
    }
}
