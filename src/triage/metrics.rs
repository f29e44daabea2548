//! Running totals for one triage invocation.

use std::fmt::Write as _;
use std::time::Duration;

/// Ephemeral aggregate over one run; printed at completion and
/// discarded.
///
/// Skipped-cached attachments and failed downloads contribute nothing
/// to the byte and duration totals — only bytes that actually crossed
/// the wire are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunMetrics {
    /// Candidate records returned by the registry search.
    pub candidates: usize,
    /// Attachments skipped because their canonical path already existed.
    pub skipped_cached: usize,
    /// Attachments whose download failed.
    pub download_failures: usize,
    /// Attachments downloaded and scanned.
    pub downloaded: usize,
    /// Attachments judged infected and quarantined.
    pub infected: usize,
    /// Clean attachments whose cached file was deleted.
    pub clean_deleted: usize,
    /// Clean attachments whose deletion failed (non-fatal).
    pub delete_failures: usize,
    /// Total bytes downloaded.
    pub total_bytes: u64,
    /// Cumulative download duration.
    pub download_time: Duration,
    /// Cumulative scan duration.
    pub scan_time: Duration,
}

impl RunMetrics {
    /// Credit one successful download.
    pub fn add_download(&mut self, bytes: u64, duration: Duration) {
        self.downloaded += 1;
        self.total_bytes += bytes;
        self.download_time += duration;
    }

    /// Credit one signature scan.
    pub fn add_scan(&mut self, duration: Duration) {
        self.scan_time += duration;
    }

    /// Operator-facing end-of-run summary block.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Candidates:          {}", self.candidates);
        let _ = writeln!(
            out,
            "Processed:           {} downloaded, {} cached, {} failed",
            self.downloaded, self.skipped_cached, self.download_failures
        );
        let _ = writeln!(
            out,
            "Verdicts:            {} infected, {} clean deleted, {} delete failures",
            self.infected, self.clean_deleted, self.delete_failures
        );
        let _ = writeln!(out, "Total Size:          {} bytes", self.total_bytes);
        let _ = writeln!(
            out,
            "Total Scan Time:     {}",
            format_duration(self.scan_time)
        );
        let _ = write!(
            out,
            "Total Download Time: {}",
            format_duration(self.download_time)
        );
        out
    }
}

fn format_duration(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}
