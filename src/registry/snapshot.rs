//! Manifest-backed registry implementation.
//!
//! A snapshot registry serves a directory of content files described
//! by a JSON manifest. It evaluates filter expressions locally with the
//! same semantics the remote registry applies, which makes it usable
//! both as an offline CLI source and as the registry double in tests.
//!
//! Manifest shape:
//!
//! ```json
//! {
//!   "attachments": [
//!     { "record": { "id": 1, "filename": "a.mb", "created_at": "…" },
//!       "content": "blobs/a.mb" }
//!   ]
//! }
//! ```
//!
//! `content` is resolved relative to the manifest's directory; a row
//! without content is searchable but not downloadable.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::core::errors::{Result, TriageError};
use crate::registry::client::RegistryClient;
use crate::registry::filter::{Condition, FilterExpr, FilterNode, FilterOp};
use crate::registry::record::{AttachmentRecord, TagRef};

/// Field names always present on attachment records, independent of
/// the schema-defined extension fields.
const TYPED_FIELDS: &[&str] = &[
    "id",
    "filename",
    "created_at",
    "updated_at",
    "tags",
    "source_file",
    "source_file_id",
];

#[derive(Debug, Deserialize)]
struct Manifest {
    attachments: Vec<ManifestRow>,
}

#[derive(Debug, Deserialize)]
struct ManifestRow {
    record: Value,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone)]
struct Row {
    record: AttachmentRecord,
    content: Option<PathBuf>,
}

/// A [`RegistryClient`] over a local manifest + content directory.
#[derive(Debug)]
pub struct SnapshotRegistry {
    rows: RefCell<Vec<Row>>,
    now: DateTime<Utc>,
}

impl SnapshotRegistry {
    /// Load a snapshot from a manifest file.
    ///
    /// Every row is validated at this boundary; a malformed record
    /// fails the load rather than surfacing mid-run.
    pub fn load(manifest_path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(manifest_path)
            .map_err(|source| TriageError::io(manifest_path, source))?;
        let manifest: Manifest = serde_json::from_str(&raw)?;
        let base = manifest_path.parent().unwrap_or_else(|| Path::new("."));

        let mut rows = Vec::with_capacity(manifest.attachments.len());
        for row in manifest.attachments {
            let record = AttachmentRecord::from_value(row.record)?;
            let content = row.content.map(|rel| base.join(rel));
            rows.push(Row { record, content });
        }
        Ok(Self {
            rows: RefCell::new(rows),
            now: Utc::now(),
        })
    }

    /// Build a snapshot from in-memory rows (tests, programmatic use).
    #[must_use]
    pub fn from_rows(rows: Vec<(AttachmentRecord, Option<PathBuf>)>) -> Self {
        Self {
            rows: RefCell::new(
                rows.into_iter()
                    .map(|(record, content)| Row { record, content })
                    .collect(),
            ),
            now: Utc::now(),
        }
    }

    /// Pin "now" for deterministic calendar-window evaluation.
    #[must_use]
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    /// Current state of a record, post any tag updates.
    #[must_use]
    pub fn record(&self, id: i64) -> Option<AttachmentRecord> {
        self.rows
            .borrow()
            .iter()
            .find(|row| row.record.id == id)
            .map(|row| row.record.clone())
    }

    fn matches(&self, record: &AttachmentRecord, filter: &FilterExpr) -> bool {
        filter.nodes().all(|node| match node {
            FilterNode::Condition(cond) => self.eval(record, cond),
            FilterNode::Any(conditions) => conditions.iter().any(|cond| self.eval(record, cond)),
        })
    }

    fn eval(&self, record: &AttachmentRecord, cond: &Condition) -> bool {
        let value = field_value(record, &cond.field);
        match cond.op {
            FilterOp::Is => value == cond.operand,
            FilterOp::GreaterThan => greater_than(&value, &cond.operand),
            FilterOp::EndsWith => match (value.as_str(), cond.operand.as_str()) {
                (Some(hay), Some(suffix)) => hay.ends_with(suffix),
                _ => false,
            },
            FilterOp::NotIn => {
                let Some(excluded) = cond.operand.as_array() else {
                    return false;
                };
                match value.as_array() {
                    // Entity-list field (tags): excluded when any member matches.
                    Some(members) => !members.iter().any(|member| excluded.contains(member)),
                    None => !excluded.contains(&value),
                }
            }
            FilterOp::InCalendarMonth => {
                let Some(offset) = cond.operand.as_i64() else {
                    return false;
                };
                let Some(created) = record.created_at else {
                    return false;
                };
                let Ok(offset) = i32::try_from(offset) else {
                    return false;
                };
                calendar_window_start(self.now, offset).is_some_and(|start| created >= start)
            }
        }
    }
}

impl RegistryClient for SnapshotRegistry {
    fn schema_fields(&self, _entity_type: &str) -> Result<BTreeSet<String>> {
        let mut fields: BTreeSet<String> =
            TYPED_FIELDS.iter().map(ToString::to_string).collect();
        for row in self.rows.borrow().iter() {
            fields.extend(row.record.extra.keys().cloned());
        }
        Ok(fields)
    }

    fn search(
        &self,
        _entity_type: &str,
        filter: &FilterExpr,
        fields: &[String],
    ) -> Result<Vec<AttachmentRecord>> {
        let rows = self.rows.borrow();
        let mut results = Vec::new();
        for row in rows.iter() {
            if !self.matches(&row.record, filter) {
                continue;
            }
            let mut record = row.record.clone();
            if !fields.is_empty() {
                record.extra.retain(|key, _| fields.iter().any(|f| f == key));
            }
            results.push(record);
        }
        Ok(results)
    }

    fn download(&self, record: &AttachmentRecord, dest: &Path) -> Result<u64> {
        let content = self
            .rows
            .borrow()
            .iter()
            .find(|row| row.record.id == record.id)
            .and_then(|row| row.content.clone())
            .ok_or_else(|| TriageError::DownloadFailed {
                id: record.id,
                filename: record.filename.clone(),
                details: "no content available for attachment".to_string(),
            })?;

        let bytes = fs::read(&content).map_err(|error| TriageError::DownloadFailed {
            id: record.id,
            filename: record.filename.clone(),
            details: format!("read {}: {error}", content.display()),
        })?;

        // Temp write + atomic rename: a failed download must never
        // leave a partial file that a later run mistakes for a cached
        // one.
        let part = part_path(dest);
        let write_result = fs::write(&part, &bytes)
            .and_then(|()| fs::rename(&part, dest));
        if let Err(error) = write_result {
            let _ = fs::remove_file(&part);
            return Err(TriageError::DownloadFailed {
                id: record.id,
                filename: record.filename.clone(),
                details: format!("write {}: {error}", dest.display()),
            });
        }
        Ok(bytes.len() as u64)
    }

    fn update_tags(&self, _entity_type: &str, id: i64, tags: &[TagRef]) -> Result<()> {
        let mut rows = self.rows.borrow_mut();
        let row = rows
            .iter_mut()
            .find(|row| row.record.id == id)
            .ok_or_else(|| TriageError::Registry {
                operation: "update",
                details: format!("unknown attachment id {id}"),
            })?;
        row.record.tags = tags.to_vec();
        Ok(())
    }
}

/// Sibling temp path used during downloads.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// First instant of the calendar month `offset` months from now.
///
/// Offset −2 with a current date in May yields March 1st, i.e. the
/// window "the last 2 calendar months" up to the present.
fn calendar_window_start(now: DateTime<Utc>, offset: i32) -> Option<DateTime<Utc>> {
    #[allow(clippy::cast_possible_wrap)]
    let months = now.year() * 12 + now.month0() as i32 + offset;
    let year = months.div_euclid(12);
    #[allow(clippy::cast_sign_loss)]
    let month = months.rem_euclid(12) as u32 + 1;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0).single()
}

fn field_value(record: &AttachmentRecord, field: &str) -> Value {
    match field {
        "id" => Value::from(record.id),
        "filename" => Value::from(record.filename.clone()),
        "created_at" => timestamp_value(record.created_at),
        "updated_at" => timestamp_value(record.updated_at),
        "tags" => serde_json::to_value(&record.tags).unwrap_or(Value::Null),
        "source_file" => record
            .source_file
            .clone()
            .map_or(Value::Null, Value::from),
        "source_file_id" => record.source_file_id.map_or(Value::Null, Value::from),
        other => record.extra.get(other).cloned().unwrap_or(Value::Null),
    }
}

fn timestamp_value(ts: Option<DateTime<Utc>>) -> Value {
    ts.map_or(Value::Null, |t| Value::from(t.to_rfc3339()))
}

fn greater_than(value: &Value, operand: &Value) -> bool {
    // Timestamps compare chronologically, numbers numerically,
    // everything else lexicographically.
    if let (Some(lhs), Some(rhs)) = (parse_ts(value), parse_ts(operand)) {
        return lhs > rhs;
    }
    if let (Some(lhs), Some(rhs)) = (value.as_f64(), operand.as_f64()) {
        return lhs > rhs;
    }
    match (value.as_str(), operand.as_str()) {
        (Some(lhs), Some(rhs)) => lhs > rhs,
        _ => false,
    }
}

fn parse_ts(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|t| t.with_timezone(&Utc))
}
