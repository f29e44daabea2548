//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use attachment_triage::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, TriageError};

// Registry
pub use crate::registry::client::RegistryClient;
pub use crate::registry::filter::{FilterExpr, FilterOp, TriageFilter};
pub use crate::registry::record::{AttachmentRecord, TagRef};
pub use crate::registry::snapshot::SnapshotRegistry;

// Cache
pub use crate::cache::store::CacheStore;

// Scanner
pub use crate::scanner::signature::SignatureScanner;

// Triage
pub use crate::triage::engine::{RunOutcome, RunReport, TriageEngine};
pub use crate::triage::metrics::RunMetrics;
pub use crate::triage::quarantine::{IndexFormat, QuarantineIndex};
