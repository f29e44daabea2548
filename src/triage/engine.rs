//! Triage engine: the per-attachment state machine and run loop.
//!
//! Per attachment:
//!
//! ```text
//! CANDIDATE → {SKIPPED_ALREADY_CACHED} | DOWNLOAD_FAILED → [SKIPPED]
//! CANDIDATE → DOWNLOADED → SCANNED → {INFECTED → QUARANTINED}
//!                                  | {CLEAN → DELETED | DELETE_FAILED}
//! ```
//!
//! Processing is single-threaded and fully sequential: one attachment
//! is downloaded, scanned, and dispositioned before the next begins.
//! Per-attachment failures are skip-and-log; the single fatal
//! condition is an out-of-space error, which aborts the remainder of
//! the run (no point downloading more files with no space to store
//! them). The abort is returned as a report outcome, never as a panic
//! or an unhandled error.

use std::path::Path;
use std::time::Instant;

use crate::cache::store::CacheStore;
use crate::core::config::Config;
use crate::core::errors::{Result, TriageError};
use crate::logger::run_log::{RunEvent, RunLog};
use crate::registry::client::RegistryClient;
use crate::registry::filter::TriageFilter;
use crate::registry::record::{AttachmentRecord, TagRef};
use crate::scanner::signature::SignatureScanner;
use crate::triage::metrics::RunMetrics;
use crate::triage::quarantine::{IndexWriter, QuarantineIndex};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every candidate was processed.
    Completed,
    /// The run stopped early on an out-of-space condition.
    AbortedStorageFull,
}

/// Result of one pipeline invocation.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// How the run ended.
    pub outcome: RunOutcome,
    /// Accumulated totals.
    pub metrics: RunMetrics,
}

type RemoveFn = Box<dyn FnMut(&CacheStore, &Path) -> Result<()>>;

/// Orchestrates registry search, dedup, download, scan, and
/// disposition for one run.
pub struct TriageEngine<'a, C: RegistryClient> {
    client: &'a C,
    config: Config,
    cache: CacheStore,
    scanner: SignatureScanner,
    index_writer: IndexWriter,
    log: RunLog,
    remover: RemoveFn,
}

impl<'a, C: RegistryClient> TriageEngine<'a, C> {
    /// Build an engine over a validated configuration.
    pub fn new(client: &'a C, config: Config) -> Result<Self> {
        config.validate()?;
        let cache = CacheStore::open(&config.cache.root)?;
        let scanner = SignatureScanner::new(config.signature_bytes());
        let index_writer = IndexWriter::new(
            &config.quarantine.index_path,
            config.quarantine.index_format,
        );
        let log = RunLog::open(&config.log.run_log);
        Ok(Self {
            client,
            config,
            cache,
            scanner,
            index_writer,
            log,
            remover: Box::new(|cache, path| cache.remove(path)),
        })
    }

    /// Replace the clean-file remover. Fault-injection seam used by
    /// tests to simulate storage failures on delete.
    pub fn with_remove_hook(mut self, remover: RemoveFn) -> Self {
        self.remover = remover;
        self
    }

    /// Execute one full triage run.
    ///
    /// Search and schema failures abort before any attachment is
    /// touched. Once iteration starts, only out-of-space stops the
    /// loop; the summary is printed in every case.
    pub fn run(&mut self) -> Result<RunReport> {
        let entity = self.config.registry.entity_type.clone();
        let filter = TriageFilter {
            calendar_window_offset: self.config.scan.calendar_window_offset,
            suffixes: self.config.scan.suffixes.clone(),
            excluded_tags: vec![TagRef::tag(self.config.registry.quarantine_tag_id)],
        }
        .build();

        let fields: Vec<String> = self
            .client
            .schema_fields(&entity)?
            .into_iter()
            .collect();
        let records = self.client.search(&entity, &filter, &fields)?;

        let mut metrics = RunMetrics {
            candidates: records.len(),
            ..RunMetrics::default()
        };
        let mut index = QuarantineIndex::default();
        self.log.record(&RunEvent::RunStarted {
            candidates: records.len(),
        });

        let mut outcome = RunOutcome::Completed;
        for record in &records {
            match self.process(record, &mut metrics, &mut index) {
                Ok(()) => {}
                Err(error) if error.is_fatal() => {
                    eprintln!("atriage: {error}; aborting run");
                    let path = match &error {
                        TriageError::StorageFull { path } => path.display().to_string(),
                        _ => String::new(),
                    };
                    self.log.record(&RunEvent::StorageFullAbort { path });
                    outcome = RunOutcome::AbortedStorageFull;
                    break;
                }
                Err(error) => {
                    // Unexpected per-attachment errors never terminate
                    // the loop silently.
                    eprintln!("atriage: skipping attachment {}: {error}", record.id);
                    self.log.record(&RunEvent::AttachmentSkipped {
                        id: record.id,
                        error_code: error.code().to_string(),
                        error: error.to_string(),
                    });
                }
            }
        }

        self.log.record(&RunEvent::RunFinished {
            total_bytes: metrics.total_bytes,
            download_ms: u64::try_from(metrics.download_time.as_millis()).unwrap_or(u64::MAX),
            scan_ms: u64::try_from(metrics.scan_time.as_millis()).unwrap_or(u64::MAX),
            infected: metrics.infected,
            clean_deleted: metrics.clean_deleted,
        });
        self.log.flush();

        println!("{}", metrics.summary());
        Ok(RunReport { outcome, metrics })
    }

    fn process(
        &mut self,
        record: &AttachmentRecord,
        metrics: &mut RunMetrics,
        index: &mut QuarantineIndex,
    ) -> Result<()> {
        let path = self.cache.canonical_path(record)?;

        // Idempotence marker: a file at the canonical path was fully
        // processed by a prior run. No metric credit.
        if self.cache.exists(&path) {
            metrics.skipped_cached += 1;
            self.log.record(&RunEvent::SkippedCached {
                id: record.id,
                path: path.to_string_lossy().into_owned(),
            });
            return Ok(());
        }

        let started = Instant::now();
        let size = match self.client.download(record, &path) {
            Ok(size) => size,
            Err(error) => {
                metrics.download_failures += 1;
                eprintln!("atriage: {error}");
                self.log.record(&RunEvent::DownloadFailed {
                    id: record.id,
                    filename: record.filename.clone(),
                    error: error.to_string(),
                });
                return Ok(());
            }
        };
        let download_elapsed = started.elapsed();
        metrics.add_download(size, download_elapsed);
        self.log.record(&RunEvent::Downloaded {
            id: record.id,
            path: path.to_string_lossy().into_owned(),
            size,
            duration_ms: u64::try_from(download_elapsed.as_millis()).unwrap_or(u64::MAX),
        });

        let bytes = self.cache.read(&path)?;
        let scan_started = Instant::now();
        let infected = self.scanner.detect(&bytes);
        let scan_elapsed = scan_started.elapsed();
        metrics.add_scan(scan_elapsed);

        if infected {
            metrics.infected += 1;
            self.quarantine(record, &path, index, scan_elapsed)?;
        } else {
            match (self.remover)(&self.cache, &path) {
                Ok(()) => {
                    metrics.clean_deleted += 1;
                    self.log.record(&RunEvent::CleanDeleted {
                        id: record.id,
                        path: path.to_string_lossy().into_owned(),
                    });
                }
                Err(error) if error.is_fatal() => return Err(error),
                Err(error) => {
                    metrics.delete_failures += 1;
                    eprintln!("atriage: {error}");
                    self.log.record(&RunEvent::DeleteFailed {
                        id: record.id,
                        path: path.to_string_lossy().into_owned(),
                        error_code: error.code().to_string(),
                        error: error.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Quarantine an infected attachment: index first, tag second.
    ///
    /// The registry tag is pushed only after the index append
    /// succeeds, so no attachment is ever tagged in the registry while
    /// absent from the persisted index.
    fn quarantine(
        &mut self,
        record: &AttachmentRecord,
        path: &Path,
        index: &mut QuarantineIndex,
        scan_elapsed: std::time::Duration,
    ) -> Result<()> {
        let sanitized = record.sanitized_for_index(path);
        let (key, _) = index.merge(sanitized);

        if let Err(error) = self.index_writer.append(index, &key) {
            if error.is_fatal() {
                return Err(error);
            }
            eprintln!("atriage: {error}");
            self.log.record(&RunEvent::IndexAppendFailed {
                id: record.id,
                error: error.to_string(),
            });
            // Tag withheld: registry and index must not diverge.
            return Ok(());
        }

        let tags = vec![TagRef::tag(self.config.registry.quarantine_tag_id)];
        let entity = self.config.registry.entity_type.clone();
        if let Err(error) = self.client.update_tags(&entity, record.id, &tags) {
            eprintln!("atriage: {error}");
            self.log.record(&RunEvent::TagUpdateFailed {
                id: record.id,
                error: error.to_string(),
            });
        }

        self.log.record(&RunEvent::Infected {
            id: record.id,
            path: path.to_string_lossy().into_owned(),
            scan_ms: u64::try_from(scan_elapsed.as_millis()).unwrap_or(u64::MAX),
        });
        Ok(())
    }
}
