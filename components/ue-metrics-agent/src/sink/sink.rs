// Local crates
use crate::{
    influx::{
        client::{InfluxClient, InfluxError},
        point::{Point, UE_MEASUREMENT},
    },
    metrics::metrics::{
        INCOMPLETE_UES_SKIPPED_TOTAL, POINT_WRITE_FAILURES_TOTAL, POINTS_WRITTEN_TOTAL,
    },
    parser::models::{MetricRecord, UeMetrics},
};

// External crates
use std::io;
use tracing::instrument;

/// Tag value for the direction of a UE point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Downlink,
    Uplink,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Downlink => "downlink",
            Direction::Uplink => "uplink",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error(transparent)]
    Influx(#[from] InfluxError),
    #[error("failed to write point to console: {0}")]
    Console(#[from] io::Error),
}

/// Destination for UE points.
#[allow(async_fn_in_trait)]
pub trait MetricsSink {
    /// Human readable name used in log events.
    fn name(&self) -> &str;

    async fn write_point(&self, point: &Point) -> Result<(), SinkError>;
}

impl MetricsSink for InfluxClient {
    fn name(&self) -> &str {
        "influxdb"
    }

    async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
        InfluxClient::write_point(self, point).await?;
        Ok(())
    }
}

/// Outcome of emitting one snapshot.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmitSummary {
    pub complete_ues: usize,
    pub skipped_ues: usize,
    pub points_written: usize,
    pub points_failed: usize,
}

/// Builds the downlink and uplink points for `record`, or `None` when either
/// direction still has an unset field.
pub fn ue_points(record: &MetricRecord) -> Option<[(Direction, Point); 2]> {
    let dl = &record.downlink;
    let ul = &record.uplink;

    let downlink = Point::new(UE_MEASUREMENT)
        .tag("ue_id", record.ue_id.as_str())
        .tag("direction", Direction::Downlink.as_str())
        .field("rsrp", dl.rsrp?)
        .field("cqi", dl.cqi?)
        .field("bler", dl.bler?)
        .field("mcs", dl.mcs?)
        .field("bytes", dl.transmitted_bytes?);

    let uplink = Point::new(UE_MEASUREMENT)
        .tag("ue_id", record.ue_id.as_str())
        .tag("direction", Direction::Uplink.as_str())
        .field("bler", ul.bler?)
        .field("mcs", ul.mcs?)
        .field("snr", ul.snr)
        .field("bytes", ul.transmitted_bytes?);

    Some([(Direction::Downlink, downlink), (Direction::Uplink, uplink)])
}

/// Ship every complete UE in `metrics` to `sink`, two points per UE.
///
/// Incomplete UEs are skipped. A failed write is logged and does not stop
/// the remaining writes of the same snapshot.
#[instrument(
    name = "ue_metrics_sink::emit_snapshot",
    target = "sink::sink",
    skip_all,
    fields(sink = sink.name()),
    level = "debug"
)]
pub async fn emit_snapshot<S: MetricsSink>(sink: &S, metrics: &UeMetrics) -> EmitSummary {
    let mut summary = EmitSummary::default();

    if metrics.is_empty() {
        tracing::error!("No metrics to send");
        return summary;
    }

    for (ue_id, record) in metrics {
        let Some(points) = ue_points(record) else {
            tracing::warn!(ue_id = %ue_id, "Incomplete metrics for UE, skipping");
            INCOMPLETE_UES_SKIPPED_TOTAL.inc();
            summary.skipped_ues += 1;
            continue;
        };
        summary.complete_ues += 1;

        for (direction, point) in points {
            match sink.write_point(&point).await {
                Ok(()) => {
                    tracing::debug!(
                        ue_id = %ue_id,
                        direction = direction.as_str(),
                        "Sent UE metrics"
                    );
                    POINTS_WRITTEN_TOTAL.inc();
                    summary.points_written += 1;
                }
                Err(e) => {
                    tracing::error!(
                        ue_id = %ue_id,
                        direction = direction.as_str(),
                        error = %e,
                        "Failed to send UE metrics"
                    );
                    POINT_WRITE_FAILURES_TOTAL.inc();
                    summary.points_failed += 1;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
pub(crate) mod test_sink {
    use super::*;
    use std::sync::Mutex;

    /// Records every point it is asked to write; fails writes whose
    /// `(ue_id, direction)` is listed in `fail`.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub written: Mutex<Vec<Point>>,
        pub fail: Vec<(String, &'static str)>,
    }

    impl MetricsSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
            let key = (
                point.tag_value("ue_id").unwrap_or_default().to_string(),
                point.tag_value("direction").unwrap_or_default(),
            );
            if self.fail.iter().any(|(ue, dir)| *ue == key.0 && *dir == key.1) {
                return Err(io::Error::other("injected failure").into());
            }
            self.written.lock().unwrap().push(point.clone());
            Ok(())
        }
    }
}
