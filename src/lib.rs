#![forbid(unsafe_code)]

//! Attachment Triage (atriage) — asset-hygiene batch pipeline for a
//! remote digital-asset registry.
//!
//! The pipeline queries the registry for attachment records matching a
//! calendar window and a filename-suffix allowlist, downloads each
//! candidate exactly once, scans the raw bytes for a known malicious
//! signature, and then either quarantines (tag + index entry, local
//! copy retained) or deletes the cached file. Running totals for bytes
//! transferred, scan time, and download time are reported at the end
//! of the run.
//!
//! # Library usage
//!
//! Use the [`prelude`] for convenient access to the most common types:
//!
//! ```rust,no_run
//! use attachment_triage::prelude::*;
//! ```
//!
//! Individual modules can also be imported directly:
//!
//! ```rust,no_run
//! use attachment_triage::core::config::Config;
//! use attachment_triage::triage::engine::TriageEngine;
//! ```

pub mod prelude;

pub mod cache;
pub mod core;
pub mod logger;
pub mod registry;
pub mod scanner;
pub mod triage;
