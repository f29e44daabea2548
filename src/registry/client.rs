//! The registry protocol boundary.

use std::collections::BTreeSet;
use std::path::Path;

use crate::core::errors::Result;
use crate::registry::filter::FilterExpr;
use crate::registry::record::{AttachmentRecord, TagRef};

/// Stable interface over the remote asset registry.
///
/// No business logic lives behind this trait; implementations wrap the
/// registry's schema-read, filtered-search, download, and update
/// operations and nothing else.
pub trait RegistryClient {
    /// Field names defined by the registry schema for `entity_type`.
    ///
    /// The triage engine requests the full field set on every search so
    /// that registry schema changes never require a code change.
    fn schema_fields(&self, entity_type: &str) -> Result<BTreeSet<String>>;

    /// Records matching `filter`, in registry order, carrying `fields`.
    fn search(
        &self,
        entity_type: &str,
        filter: &FilterExpr,
        fields: &[String],
    ) -> Result<Vec<AttachmentRecord>>;

    /// Download the attachment content to `dest`, returning the byte
    /// count written.
    ///
    /// Contract: a failed download must never leave a partial file at
    /// `dest` — implementations write to a sibling temp path and rename
    /// onto `dest` only after a complete write. A file present at
    /// `dest` is therefore always a complete prior download.
    fn download(&self, record: &AttachmentRecord, dest: &Path) -> Result<u64>;

    /// Replace the tag set of the record with `tags`.
    ///
    /// Idempotent from the registry's perspective: setting the same tag
    /// set twice is a no-op.
    fn update_tags(&self, entity_type: &str, id: i64, tags: &[TagRef]) -> Result<()>;
}
