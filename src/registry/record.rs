//! Attachment record model and adapter-boundary validation.
//!
//! Registry rows are schema-defined and loosely shaped on the wire.
//! The record keeps the fields the pipeline actually reads as typed
//! members and collects everything else into an open extension map, so
//! a registry schema change never requires a code change here.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::errors::{Result, TriageError};

/// Reference to a tag entity on the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRef {
    /// Registry entity type, always `"Tag"` for tags.
    #[serde(rename = "type")]
    pub entity_type: String,
    /// Tag identifier.
    pub id: i64,
}

impl TagRef {
    /// Reference a tag by id.
    #[must_use]
    pub fn tag(id: i64) -> Self {
        Self {
            entity_type: "Tag".to_string(),
            id,
        }
    }
}

/// One attachment row as held in memory during an iteration.
///
/// The pipeline mutates only the tag set and the two bookkeeping
/// fields (`source_file`, `source_file_id`); everything else is a
/// transient read-only copy of registry state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentRecord {
    /// Unique registry identifier.
    pub id: i64,
    /// Original filename of the attachment.
    pub filename: String,
    /// Creation timestamp; nulled in quarantine-index copies.
    pub created_at: Option<DateTime<Utc>>,
    /// Update timestamp; nulled in quarantine-index copies.
    pub updated_at: Option<DateTime<Utc>>,
    /// Mutable tag set.
    #[serde(default)]
    pub tags: Vec<TagRef>,
    /// Local cache path, attached when the record is quarantined.
    #[serde(default)]
    pub source_file: Option<String>,
    /// Copy of [`Self::id`], attached when the record is quarantined.
    #[serde(default)]
    pub source_file_id: Option<i64>,
    /// Schema-defined fields not interpreted by the pipeline.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AttachmentRecord {
    /// Minimal record for construction in adapters and tests.
    #[must_use]
    pub fn new(id: i64, filename: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            filename: filename.into(),
            created_at: Some(created_at),
            updated_at: None,
            tags: Vec::new(),
            source_file: None,
            source_file_id: None,
            extra: BTreeMap::new(),
        }
    }

    /// Validate and convert a raw registry payload.
    ///
    /// Adapter-boundary check: a row without a positive id or a
    /// filename is unusable and is rejected here rather than deep in
    /// the pipeline.
    pub fn from_value(value: Value) -> Result<Self> {
        let record: Self =
            serde_json::from_value(value).map_err(|error| TriageError::RecordInvalid {
                details: error.to_string(),
            })?;
        if record.id <= 0 {
            return Err(TriageError::RecordInvalid {
                details: format!("attachment id must be > 0, got {}", record.id),
            });
        }
        if record.filename.is_empty() {
            return Err(TriageError::RecordInvalid {
                details: format!("attachment {} has an empty filename", record.id),
            });
        }
        Ok(record)
    }

    /// Whether the record already carries the given tag.
    #[must_use]
    pub fn has_tag(&self, tag_id: i64) -> bool {
        self.tags.iter().any(|tag| tag.id == tag_id)
    }

    /// Sanitized copy for the quarantine index.
    ///
    /// Timestamps are nulled (they churn on every registry update and
    /// would make index appends diff-noisy), and the cached path and
    /// source id are attached as bookkeeping fields.
    #[must_use]
    pub fn sanitized_for_index(&self, cached_path: &Path) -> Self {
        let mut copy = self.clone();
        copy.created_at = None;
        copy.updated_at = None;
        copy.source_file = Some(cached_path.to_string_lossy().into_owned());
        copy.source_file_id = Some(self.id);
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, 12, 9, 30, 0).unwrap()
    }

    #[test]
    fn from_value_accepts_full_row() {
        let value = serde_json::json!({
            "id": 1717073,
            "filename": "shot_010.mb",
            "created_at": "2021-05-12T09:30:00Z",
            "updated_at": null,
            "tags": [{ "type": "Tag", "id": 12 }],
            "project": { "type": "Project", "id": 4 },
            "sg_status_list": "ip",
        });
        let record = AttachmentRecord::from_value(value).expect("record should parse");
        assert_eq!(record.id, 1_717_073);
        assert_eq!(record.filename, "shot_010.mb");
        assert!(record.has_tag(12));
        // Schema-defined fields survive in the extension map.
        assert!(record.extra.contains_key("project"));
        assert_eq!(record.extra["sg_status_list"], "ip");
    }

    #[test]
    fn from_value_rejects_missing_id() {
        let value = serde_json::json!({ "filename": "a.mb" });
        let err = AttachmentRecord::from_value(value).expect_err("expected rejection");
        assert_eq!(err.code(), "ATG-2003");
    }

    #[test]
    fn from_value_rejects_non_positive_id() {
        let value = serde_json::json!({ "id": 0, "filename": "a.mb" });
        let err = AttachmentRecord::from_value(value).expect_err("expected rejection");
        assert!(err.to_string().contains("id must be > 0"));
    }

    #[test]
    fn from_value_rejects_empty_filename() {
        let value = serde_json::json!({ "id": 9, "filename": "" });
        let err = AttachmentRecord::from_value(value).expect_err("expected rejection");
        assert!(err.to_string().contains("empty filename"));
    }

    #[test]
    fn sanitized_copy_nulls_timestamps_and_attaches_source() {
        let mut record = AttachmentRecord::new(42, "scene.ma", ts());
        record.updated_at = Some(ts());
        let path = PathBuf::from("/cache/source_20210512_42_scene.ma");

        let sanitized = record.sanitized_for_index(&path);
        assert!(sanitized.created_at.is_none());
        assert!(sanitized.updated_at.is_none());
        assert_eq!(
            sanitized.source_file.as_deref(),
            Some("/cache/source_20210512_42_scene.ma")
        );
        assert_eq!(sanitized.source_file_id, Some(42));
        // The in-memory original keeps its timestamps.
        assert!(record.created_at.is_some());
    }

    #[test]
    fn sanitized_copy_serializes_timestamps_as_null() {
        let record = AttachmentRecord::new(7, "x.mb", ts());
        let sanitized = record.sanitized_for_index(Path::new("/c/source_20210512_7_x.mb"));
        let json = serde_json::to_value(&sanitized).unwrap();
        assert_eq!(json["created_at"], Value::Null);
        assert_eq!(json["updated_at"], Value::Null);
        assert_eq!(json["source_file_id"], 7);
    }

    #[test]
    fn record_round_trips_with_extension_fields() {
        let mut record = AttachmentRecord::new(5, "a.ma", ts());
        record
            .extra
            .insert("description".to_string(), Value::String("wip".to_string()));
        let json = serde_json::to_value(&record).unwrap();
        // Flattened: extension keys sit at the top level.
        assert_eq!(json["description"], "wip");
        let back = AttachmentRecord::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
