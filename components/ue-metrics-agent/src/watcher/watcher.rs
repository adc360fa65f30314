// Local crates
use crate::{
    helpers::{load_config::MonitorConfig, shutdown::Shutdown},
    metrics::metrics::{
        LAST_SNAPSHOT_UES, MISSING_FILE_POLLS_TOTAL, SCAN_FAILURES_TOTAL, SCANS_TOTAL,
    },
    parser::accumulator::accumulate,
    sink::sink::{EmitSummary, MetricsSink, emit_snapshot},
    watcher::poller::{FilePoller, PollOutcome},
};

// External crates
use chrono::{DateTime, Utc};
use std::time::{Duration, SystemTime};
use tracing::{info, instrument};

/// Poll loop: detect a change, rescan the whole file, hand the snapshot to
/// the sink, sleep, repeat.
#[derive(Debug)]
pub struct Watcher<S: MetricsSink> {
    config: MonitorConfig,
    poller: FilePoller,
    sink: S,
}

impl<S: MetricsSink> Watcher<S> {
    pub fn new(config: MonitorConfig, sink: S) -> Self {
        let poller = FilePoller::new(&config.log_file);
        Self {
            config,
            poller,
            sink,
        }
    }

    #[cfg(test)]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Runs until `shutdown` is triggered. Shutdown is observed between
    /// cycles, never in the middle of a scan or a write.
    #[instrument(
        name = "ue_metrics_watcher::run",
        target = "watcher::watcher",
        skip_all,
        fields(log_file = %self.config.log_file.display(), sink = self.sink.name()),
        level = "debug"
    )]
    pub async fn run(&mut self, shutdown: &Shutdown) {
        info!("Monitoring {}", self.config.log_file.display());

        loop {
            if shutdown.is_triggered() {
                break;
            }
            let delay = self.poll_once().await;

            tokio::select! {
                _ = shutdown.wait_for_shutdown() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Watcher stopped");
    }

    /// One check-and-process cycle. Returns how long to wait before the next.
    pub async fn poll_once(&mut self) -> Duration {
        match self.poller.check().await {
            Ok(PollOutcome::Unchanged) => self.config.poll_interval(),
            Ok(PollOutcome::Changed { modified, content }) => {
                info!("File modified at {}", format_mtime(modified));
                self.process_snapshot(&content).await;
                self.config.poll_interval()
            }
            Ok(PollOutcome::Missing) => {
                tracing::warn!(
                    "Log file not found: {}. Waiting for it to appear",
                    self.config.log_file.display()
                );
                MISSING_FILE_POLLS_TOTAL.inc();
                self.config.retry_delay()
            }
            Err(e) => {
                tracing::error!(error = %e, "Error parsing log file");
                SCAN_FAILURES_TOTAL.inc();
                self.config.poll_interval()
            }
        }
    }

    async fn process_snapshot(&self, content: &str) -> EmitSummary {
        let snapshot = accumulate(content);
        SCANS_TOTAL.inc();
        LAST_SNAPSHOT_UES.set(snapshot.metrics.len() as i64);

        tracing::debug!(
            lines = snapshot.report.lines,
            orphan_lines = snapshot.report.orphan_lines,
            malformed_lines = snapshot.report.malformed_lines,
            ues = snapshot.metrics.len(),
            "Scanned log snapshot"
        );

        if snapshot.metrics.is_empty() {
            tracing::warn!("No metrics parsed from file");
            return EmitSummary::default();
        }

        match serde_json::to_string_pretty(&snapshot.metrics) {
            Ok(json) => tracing::debug!("Parsed metrics: {json}"),
            Err(e) => tracing::debug!(error = %e, "Could not render parsed metrics"),
        }

        info!("Successfully parsed metrics, sending to {}", self.sink.name());
        let summary = emit_snapshot(&self.sink, &snapshot.metrics).await;
        tracing::debug!(
            complete_ues = summary.complete_ues,
            points_written = summary.points_written,
            points_failed = summary.points_failed,
            skipped_ues = summary.skipped_ues,
            "Snapshot emitted"
        );
        summary
    }
}

fn format_mtime(modified: SystemTime) -> String {
    DateTime::<Utc>::from(modified).to_rfc3339()
}
