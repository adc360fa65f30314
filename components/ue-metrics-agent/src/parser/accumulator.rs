// Local crates
use crate::parser::{
    extractor::{
        CQI_MARKER, DLSCH_MARKER, Extraction, MAC_BYTES_MARKER, ULSCH_MARKER, extract_cqi,
        extract_dlsch, extract_mac_bytes, extract_rsrp, extract_ue_id, extract_ulsch,
    },
    models::{MetricRecord, UeMetrics},
};

// External crates
use std::io;
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Reasons a log snapshot could not be scanned at all.
///
/// A readable snapshot without any recognizable line is *not* an error; it
/// yields an empty [`UeMetrics`].
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    /// The file does not exist.
    #[error("log file {0} not found")]
    NotFound(PathBuf),
    /// Any other read failure, including non UTF-8 content.
    #[error("failed to read log file {path}: {source}")]
    Io {
        /// File that failed to read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },
}

impl ScanError {
    /// Maps `NotFound` to [`ScanError::NotFound`], everything else to [`ScanError::Io`].
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            ScanError::NotFound(path.to_path_buf())
        } else {
            ScanError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }
}

/// Bookkeeping for one scan, used for debug logging and self metrics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// Lines fed to the accumulator.
    pub lines: usize,
    /// Lines seen before any `UE RNTI` marker.
    pub orphan_lines: usize,
    /// Metric lines whose marker matched but whose values could not be read.
    pub malformed_lines: usize,
}

/// Result of scanning one full snapshot of the log.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Snapshot {
    /// Records keyed by UE identifier.
    pub metrics: UeMetrics,
    /// Line counters for the scan.
    pub report: ScanReport,
}

/// Line-by-line state machine that attributes metric lines to the most
/// recently announced UE.
#[derive(Debug, Default)]
pub struct Accumulator {
    metrics: UeMetrics,
    current_ue: Option<String>,
    report: ScanReport,
}

impl Accumulator {
    /// Empty accumulator with no current UE.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one line. Lines must be fed in file order.
    pub fn push_line(&mut self, raw: &str) {
        let line = raw.trim();
        self.report.lines += 1;

        if let Extraction::Value(ue_id) = extract_ue_id(line) {
            tracing::debug!(ue_id, "Found UE identifier");
            let record = self
                .metrics
                .entry(ue_id.to_string())
                .or_insert_with(|| MetricRecord::new(ue_id));

            match extract_rsrp(line) {
                Extraction::Value(rsrp) => {
                    tracing::debug!(ue_id, rsrp, "Found downlink RSRP");
                    record.downlink.rsrp = Some(rsrp);
                }
                Extraction::Malformed => self.report.malformed_lines += 1,
                Extraction::Absent => {}
            }

            self.current_ue = Some(ue_id.to_string());
            return;
        }

        let Some(ue_id) = self.current_ue.as_deref() else {
            self.report.orphan_lines += 1;
            return;
        };
        let Some(record) = self.metrics.get_mut(ue_id) else {
            return;
        };

        let malformed = if line.contains(CQI_MARKER) {
            let cqi = extract_cqi(line);
            if let Extraction::Value(value) = cqi {
                tracing::debug!(ue_id, cqi = value, "Found downlink CQI");
                record.downlink.cqi = Some(value);
            }
            cqi.is_malformed()
        } else if line.contains(DLSCH_MARKER) {
            let outcome = extract_dlsch(line);
            if let Extraction::Value(dl) = outcome {
                tracing::debug!(ue_id, bler = dl.bler, mcs = dl.mcs, "Found downlink BLER and MCS");
                record.downlink.bler = Some(dl.bler);
                record.downlink.mcs = Some(dl.mcs);
            }
            outcome.is_malformed()
        } else if line.contains(ULSCH_MARKER) {
            let outcome = extract_ulsch(line);
            if let Extraction::Value(ul) = outcome {
                tracing::debug!(ue_id, bler = ul.bler, mcs = ul.mcs, "Found uplink BLER and MCS");
                record.uplink.bler = Some(ul.bler);
                record.uplink.mcs = Some(ul.mcs);
            }
            outcome.is_malformed()
        } else if line.contains(MAC_BYTES_MARKER) {
            let counters = extract_mac_bytes(line);
            if let Extraction::Value(bytes) = counters {
                tracing::debug!(ue_id, tx = bytes.tx, rx = bytes.rx, "Found MAC byte counters");
                record.downlink.transmitted_bytes = Some(bytes.tx);
                record.uplink.transmitted_bytes = Some(bytes.rx);
            }
            counters.is_malformed()
        } else {
            false
        };

        if malformed {
            tracing::trace!(ue_id, line, "Metric marker present but values unreadable, keeping previous values");
            self.report.malformed_lines += 1;
        }
    }

    /// Consume the accumulator and return what it collected.
    pub fn finish(self) -> Snapshot {
        Snapshot {
            metrics: self.metrics,
            report: self.report,
        }
    }
}

/// Scan a full snapshot of the log text.
pub fn accumulate(content: &str) -> Snapshot {
    let mut acc = Accumulator::new();
    for line in content.lines() {
        acc.push_line(line);
    }
    acc.finish()
}

/// Read `path` and scan it. A file that cannot be read yields `Err`; this is
/// the only way a scan produces "no metrics" rather than an empty mapping.
#[instrument(
    name = "ue_metrics_parser::scan_file",
    target = "parser::accumulator",
    skip_all,
    fields(path = %path.display()),
    level = "debug"
)]
pub async fn scan_file(path: &Path) -> Result<Snapshot, ScanError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ScanError::from_io(path, e))?;

    let snapshot = accumulate(&content);

    tracing::debug!(
        ue_count = snapshot.metrics.len(),
        lines = snapshot.report.lines,
        orphan_lines = snapshot.report.orphan_lines,
        malformed_lines = snapshot.report.malformed_lines,
        "Scanned log snapshot"
    );
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SINGLE_UE: &str = "\
UE RNTI a37f: average RSRP -75
UE a37f: CQI 11
UE a37f: dlsch_rounds 1/0/0/0, dlsch_errors 0, BLER 0.02 MCS 9
UE a37f: ulsch_rounds 1/0/0/0, ulsch_errors 0, BLER 0.01 MCS 8
UE a37f: MAC: TX 1000 RX 500 bytes
";

    #[test]
    fn end_to_end_single_ue() {
        let snapshot = accumulate(SINGLE_UE);
        let record = &snapshot.metrics["a37f"];

        assert_eq!(snapshot.metrics.len(), 1);
        assert_eq!(record.ue_id, "a37f");
        assert_eq!(record.downlink.rsrp, Some(-75));
        assert_eq!(record.downlink.cqi, Some(11));
        assert_eq!(record.downlink.bler, Some(0.02));
        assert_eq!(record.downlink.mcs, Some(9));
        assert_eq!(record.downlink.transmitted_bytes, Some(1000));
        assert_eq!(record.uplink.bler, Some(0.01));
        assert_eq!(record.uplink.mcs, Some(8));
        assert_eq!(record.uplink.prb, 0);
        assert_eq!(record.uplink.snr, 0);
        assert_eq!(record.uplink.transmitted_bytes, Some(500));
        assert!(record.is_complete());
        assert_eq!(snapshot.report.lines, 5);
        assert_eq!(snapshot.report.malformed_lines, 0);
    }

    #[test]
    fn scanning_is_deterministic() {
        assert_eq!(accumulate(SINGLE_UE), accumulate(SINGLE_UE));
    }

    #[test]
    fn metric_lines_stay_with_their_own_ue() {
        let content = "\
UE RNTI a37f: average RSRP -75
UE a37f: CQI 11
UE a37f: MAC: TX 1000 RX 500 bytes
UE RNTI b210: average RSRP -90
UE b210: dlsch_rounds 4/1/0/0, BLER 0.30 MCS 3
";
        let metrics = accumulate(content).metrics;
        let a = &metrics["a37f"];
        let b = &metrics["b210"];

        assert_eq!(a.downlink.rsrp, Some(-75));
        assert_eq!(a.downlink.cqi, Some(11));
        assert_eq!(a.downlink.bler, None);
        assert_eq!(a.downlink.mcs, None);

        assert_eq!(b.downlink.rsrp, Some(-90));
        assert_eq!(b.downlink.cqi, None);
        assert_eq!(b.downlink.bler, Some(0.30));
        assert_eq!(b.downlink.mcs, Some(3));
        assert_eq!(b.downlink.transmitted_bytes, None);
        assert_eq!(b.uplink.transmitted_bytes, None);
    }

    #[test]
    fn trailing_line_overwrites_only_its_fields() {
        let initial = accumulate(SINGLE_UE).metrics;
        let extended = format!("{SINGLE_UE}UE a37f: dlsch_rounds 2/0/0/0, BLER 0.05 MCS 12\n");
        let updated = accumulate(&extended).metrics;

        let before = &initial["a37f"];
        let after = &updated["a37f"];
        assert_eq!(after.downlink.bler, Some(0.05));
        assert_eq!(after.downlink.mcs, Some(12));
        assert_eq!(after.downlink.rsrp, before.downlink.rsrp);
        assert_eq!(after.downlink.cqi, before.downlink.cqi);
        assert_eq!(after.downlink.transmitted_bytes, before.downlink.transmitted_bytes);
        assert_eq!(after.uplink, before.uplink);
    }

    #[test]
    fn malformed_line_keeps_previous_values() {
        let content = format!("{SINGLE_UE}UE a37f: dlsch_rounds 3/0/0/0, dlsch_errors 0\n");
        let snapshot = accumulate(&content);
        let record = &snapshot.metrics["a37f"];

        assert_eq!(record.downlink.bler, Some(0.02));
        assert_eq!(record.downlink.mcs, Some(9));
        assert_eq!(snapshot.report.malformed_lines, 1);
    }

    #[test]
    fn lines_before_any_ue_are_ignored() {
        let content = "\
UE a37f: CQI 11
UE a37f: MAC: TX 1000 RX 500 bytes
UE RNTI a37f: average RSRP -75
";
        let snapshot = accumulate(content);
        let record = &snapshot.metrics["a37f"];

        assert_eq!(record.downlink.cqi, None);
        assert_eq!(record.downlink.transmitted_bytes, None);
        assert_eq!(record.downlink.rsrp, Some(-75));
        assert_eq!(snapshot.report.orphan_lines, 2);
    }

    #[test]
    fn repeated_identifier_keeps_existing_record() {
        let content = "\
UE RNTI a37f: average RSRP -75
UE a37f: CQI 11
UE RNTI a37f in-sync
";
        let record = &accumulate(content).metrics["a37f"];
        assert_eq!(record.downlink.rsrp, Some(-75));
        assert_eq!(record.downlink.cqi, Some(11));
    }

    #[test]
    fn cqi_marker_takes_priority_over_schedule_markers() {
        let content = "\
UE RNTI a37f: average RSRP -75
UE a37f: CQI 7 dlsch_rounds 1/0/0/0, BLER 0.50 MCS 2
";
        let record = &accumulate(content).metrics["a37f"];
        assert_eq!(record.downlink.cqi, Some(7));
        assert_eq!(record.downlink.bler, None);
    }

    #[test]
    fn downlink_only_ue_is_incomplete() {
        let content = "\
UE RNTI a37f: average RSRP -75
UE a37f: CQI 11
UE a37f: dlsch_rounds 1/0/0/0, BLER 0.02 MCS 9
";
        let record = &accumulate(content).metrics["a37f"];
        assert!(!record.downlink.is_complete());
        assert!(!record.is_complete());
    }

    #[test]
    fn empty_input_yields_empty_mapping() {
        let snapshot = accumulate("");
        assert!(snapshot.metrics.is_empty());
        assert_eq!(snapshot.report, ScanReport::default());
    }

    #[tokio::test]
    async fn scan_file_reads_snapshot() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SINGLE_UE.as_bytes()).unwrap();

        let snapshot = scan_file(file.path()).await.unwrap();
        assert!(snapshot.metrics["a37f"].is_complete());
    }

    #[tokio::test]
    async fn scan_file_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nrMAC_stats.log");

        let err = scan_file(&missing).await.unwrap_err();
        assert!(matches!(err, ScanError::NotFound(path) if path == missing));
    }
}
