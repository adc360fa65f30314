// External crates
use serde::Serialize;
use std::collections::BTreeMap;

/// UE identifier as captured from the `UE RNTI <id>` marker.
pub type UeId = String;

/// Per-UE metric records for one scan of the log, ordered by UE identifier.
pub type UeMetrics = BTreeMap<UeId, MetricRecord>;

/// Downlink half of a [`MetricRecord`]. Every field stays `None` until a log
/// line for the owning UE provides it.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DownlinkMetrics {
    /// Reference signal received power, dBm.
    #[serde(rename = "RSRP")]
    pub rsrp: Option<i64>,
    /// Channel quality indicator.
    #[serde(rename = "CQI")]
    pub cqi: Option<i64>,
    /// Downlink block error rate.
    #[serde(rename = "BLER")]
    pub bler: Option<f64>,
    /// Downlink modulation and coding scheme.
    #[serde(rename = "MCS")]
    pub mcs: Option<i64>,
    /// MAC `TX` byte counter.
    pub transmitted_bytes: Option<i64>,
}

impl DownlinkMetrics {
    /// `true` once every downlink field has been observed.
    pub fn is_complete(&self) -> bool {
        self.rsrp.is_some()
            && self.cqi.is_some()
            && self.bler.is_some()
            && self.mcs.is_some()
            && self.transmitted_bytes.is_some()
    }
}

/// Uplink half of a [`MetricRecord`].
///
/// `prb` and `snr` are not present in the MAC statistics log and are always
/// reported as `0`.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct UplinkMetrics {
    /// Uplink block error rate.
    #[serde(rename = "BLER")]
    pub bler: Option<f64>,
    /// Uplink modulation and coding scheme.
    #[serde(rename = "MCS")]
    pub mcs: Option<i64>,
    /// Allocated resource blocks.
    #[serde(rename = "PRB")]
    pub prb: i64,
    /// Signal to noise ratio.
    #[serde(rename = "SNR")]
    pub snr: i64,
    /// MAC `RX` byte counter.
    pub transmitted_bytes: Option<i64>,
}

impl UplinkMetrics {
    /// `true` once every parsed uplink field has been observed.
    pub fn is_complete(&self) -> bool {
        self.bler.is_some() && self.mcs.is_some() && self.transmitted_bytes.is_some()
    }
}

/// Radio link metrics accumulated for a single UE during one scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    /// Owning UE; the map key carries it in serialized form.
    #[serde(skip)]
    pub ue_id: UeId,
    /// Downlink half.
    pub downlink: DownlinkMetrics,
    /// Uplink half.
    pub uplink: UplinkMetrics,
}

impl MetricRecord {
    /// Fresh record with every optional field unset.
    pub fn new(ue_id: impl Into<UeId>) -> Self {
        Self {
            ue_id: ue_id.into(),
            downlink: DownlinkMetrics::default(),
            uplink: UplinkMetrics::default(),
        }
    }

    /// A record is only shipped when both directions are fully populated.
    pub fn is_complete(&self) -> bool {
        self.downlink.is_complete() && self.uplink.is_complete()
    }
}
