// External crates
use lazy_static::lazy_static;
use prometheus::{IntCounter, IntGauge, register_int_counter, register_int_gauge};

lazy_static! {
    // ======== Poller ========

    /// Log snapshots scanned after a modification was detected
    pub static ref SCANS_TOTAL: IntCounter = register_int_counter!(
        "ue_metrics_scans_total",
        "Log snapshots scanned after a detected modification"
    ).unwrap();

    /// Scans that failed for a reason other than a missing file
    pub static ref SCAN_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "ue_metrics_scan_failures_total",
        "Log snapshot reads that failed for reasons other than a missing file"
    ).unwrap();

    pub static ref MISSING_FILE_POLLS_TOTAL: IntCounter = register_int_counter!(
        "ue_metrics_missing_file_polls_total",
        "Polls that found the log file absent"
    ).unwrap();

    /// UEs present in the most recent snapshot, complete or not
    pub static ref LAST_SNAPSHOT_UES: IntGauge = register_int_gauge!(
        "ue_metrics_last_snapshot_ues",
        "UEs found in the most recent log snapshot"
    ).unwrap();

    // ======== Sink ========

    pub static ref POINTS_WRITTEN_TOTAL: IntCounter = register_int_counter!(
        "ue_metrics_points_written_total",
        "UE points accepted by the sink"
    ).unwrap();

    pub static ref POINT_WRITE_FAILURES_TOTAL: IntCounter = register_int_counter!(
        "ue_metrics_point_write_failures_total",
        "UE points the sink failed to write"
    ).unwrap();

    /// UEs left out of a snapshot because a field in either direction was unset
    pub static ref INCOMPLETE_UES_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        "ue_metrics_incomplete_ues_skipped_total",
        "UEs skipped because their downlink or uplink metrics were incomplete"
    ).unwrap();
}
