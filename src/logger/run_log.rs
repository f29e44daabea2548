//! JSONL run log: append-only line-delimited JSON for the triage run.
//!
//! Each line is a self-contained JSON object. Lines are assembled in
//! memory and written with a single `write_all` so a tailing process
//! never sees a partial line. If the log file cannot be opened or
//! written, entries degrade to stderr with an `[ATG-LOG]` prefix — the
//! pipeline never fails because of logging.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

/// One event in the life of a triage run.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        candidates: usize,
    },
    SkippedCached {
        id: i64,
        path: String,
    },
    DownloadFailed {
        id: i64,
        filename: String,
        error: String,
    },
    Downloaded {
        id: i64,
        path: String,
        size: u64,
        duration_ms: u64,
    },
    Infected {
        id: i64,
        path: String,
        scan_ms: u64,
    },
    CleanDeleted {
        id: i64,
        path: String,
    },
    DeleteFailed {
        id: i64,
        path: String,
        error_code: String,
        error: String,
    },
    IndexAppendFailed {
        id: i64,
        error: String,
    },
    TagUpdateFailed {
        id: i64,
        error: String,
    },
    AttachmentSkipped {
        id: i64,
        error_code: String,
        error: String,
    },
    StorageFullAbort {
        path: String,
    },
    RunFinished {
        total_bytes: u64,
        download_ms: u64,
        scan_ms: u64,
        infected: usize,
        clean_deleted: usize,
    },
}

#[derive(Serialize)]
struct Entry<'a> {
    ts: String,
    #[serde(flatten)]
    event: &'a RunEvent,
}

/// Append-only JSONL writer with stderr degradation.
pub struct RunLog {
    writer: Option<BufWriter<File>>,
}

impl RunLog {
    /// Open the log file for appending; degrade to stderr on failure.
    pub fn open(path: &Path) -> Self {
        let writer = open_append(path).map_or_else(
            |error| {
                let _ = writeln!(
                    io::stderr(),
                    "[ATG-LOG] cannot open {}: {error}; logging to stderr",
                    path.display()
                );
                None
            },
            |file| Some(BufWriter::with_capacity(16 * 1024, file)),
        );
        Self { writer }
    }

    /// A log that writes nothing to disk (stderr only).
    #[must_use]
    pub fn disabled() -> Self {
        Self { writer: None }
    }

    /// Record one event, stamped with the current UTC time.
    pub fn record(&mut self, event: &RunEvent) {
        let entry = Entry {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
        };
        let line = match serde_json::to_string(&entry) {
            Ok(json) => format!("{json}\n"),
            Err(error) => {
                let _ = writeln!(io::stderr(), "[ATG-LOG] serialize error: {error}");
                return;
            }
        };

        match self.writer.as_mut() {
            Some(writer) => {
                if writer.write_all(line.as_bytes()).is_err() {
                    self.writer = None;
                    let _ = write!(io::stderr(), "[ATG-LOG] {line}");
                }
            }
            None => {
                let _ = write!(io::stderr(), "[ATG-LOG] {line}");
            }
        }
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            let _ = writer.flush();
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn events_are_written_as_separate_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");
        let mut log = RunLog::open(&path);

        log.record(&RunEvent::RunStarted { candidates: 3 });
        log.record(&RunEvent::SkippedCached {
            id: 1,
            path: "/cache/source_20210401_1_a.mb".to_string(),
        });
        log.flush();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "run_started");
        assert_eq!(first["candidates"], 3);
        assert!(first["ts"].is_string());
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "skipped_cached");
        assert_eq!(second["id"], 1);
    }

    #[test]
    fn reopening_appends_rather_than_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.jsonl");

        for _ in 0..2 {
            let mut log = RunLog::open(&path);
            log.record(&RunEvent::RunFinished {
                total_bytes: 10,
                download_ms: 1,
                scan_ms: 1,
                infected: 0,
                clean_deleted: 1,
            });
            log.flush();
        }

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn unopenable_path_degrades_without_failing() {
        let mut log = RunLog::open(Path::new("/nonexistent_atg_dir/\0bad"));
        // Must not panic or error.
        log.record(&RunEvent::RunStarted { candidates: 0 });
        log.flush();
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/run.jsonl");
        let mut log = RunLog::open(&path);
        log.record(&RunEvent::RunStarted { candidates: 0 });
        log.flush();
        assert!(path.is_file());
    }
}
