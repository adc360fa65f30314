//! Pattern extraction for single lines of the OAI `nrMAC_stats.log`.
//!
//! Each metric family has a cheap substring pre-check and one regular
//! expression. The functions are pure: they never log, never panic and never
//! return errors. A line either yields a value, is not relevant to the family
//! ([`Extraction::Absent`]), or looks relevant but could not be decoded
//! ([`Extraction::Malformed`]).

// External crates
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::str::FromStr;

/// Substring that marks a CQI report line.
pub const CQI_MARKER: &str = "CQI";
/// Substring that marks a downlink scheduling summary line.
pub const DLSCH_MARKER: &str = "dlsch_rounds";
/// Substring that marks an uplink scheduling summary line.
pub const ULSCH_MARKER: &str = "ulsch_rounds";
/// Substring that marks the combined TX/RX byte counter line.
pub const MAC_BYTES_MARKER: &str = "MAC:";
const RSRP_MARKER: &str = "average RSRP";

lazy_static! {
    static ref UE_ID_RE: Regex = Regex::new(r"UE RNTI (\w+)").unwrap();
    static ref RSRP_RE: Regex =
        Regex::new(r"average RSRP (-?\d+)").unwrap();
    static ref CQI_RE: Regex = Regex::new(r"UE \w+: CQI (\d+)").unwrap();
    static ref DLSCH_RE: Regex =
        Regex::new(r"dlsch_rounds \d+/\d+/\d+/\d+.*BLER ([\d.]+) MCS.*?(\d+)")
            .unwrap();
    // The four round counters are captured but not consumed.
    static ref ULSCH_RE: Regex =
        Regex::new(r"ulsch_rounds (\d+)/(\d+)/(\d+)/(\d+).*BLER ([\d.]+) MCS.*?(\d+)")
            .unwrap();
    static ref MAC_BYTES_RE: Regex =
        Regex::new(r"UE \w+: MAC:\s+TX\s+(\d+)\s+RX\s+(\d+)\s+bytes")
            .unwrap();
}

/// Outcome of running one extractor against one line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Extraction<T> {
    /// The line carried the metric and it decoded cleanly.
    Value(T),
    /// The line is not about this metric family.
    Absent,
    /// The family marker was present but the value could not be read.
    Malformed,
}

impl<T> Extraction<T> {
    /// Converts into an `Option`, folding `Absent` and `Malformed` into `None`.
    pub fn value(self) -> Option<T> {
        match self {
            Extraction::Value(v) => Some(v),
            Extraction::Absent | Extraction::Malformed => None,
        }
    }

    /// `true` when the marker matched but the value could not be decoded.
    pub fn is_malformed(&self) -> bool {
        matches!(self, Extraction::Malformed)
    }
}

/// BLER and MCS reported on a `dlsch_rounds` / `ulsch_rounds` line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleOutcome {
    /// Block error rate, `0.0..=1.0`.
    pub bler: f64,
    /// Modulation and coding scheme index.
    pub mcs: i64,
}

/// Byte counters from a `MAC: TX <n> RX <n> bytes` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteCounters {
    /// Downlink bytes.
    pub tx: i64,
    /// Uplink bytes.
    pub rx: i64,
}

fn capture<T: FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

/// Runs `re` against `line` once `marker` has been seen, decoding with `decode`.
fn gated<T>(
    line: &str,
    marker: &str,
    re: &Regex,
    decode: impl FnOnce(&Captures<'_>) -> Option<T>,
) -> Extraction<T> {
    if !line.contains(marker) {
        return Extraction::Absent;
    }
    match re.captures(line).as_ref().and_then(decode) {
        Some(v) => Extraction::Value(v),
        None => Extraction::Malformed,
    }
}

/// Captures the UE identifier from a `UE RNTI <id>` line.
pub fn extract_ue_id(line: &str) -> Extraction<&str> {
    match UE_ID_RE.captures(line).and_then(|caps| caps.get(1)) {
        Some(m) => Extraction::Value(m.as_str()),
        None => Extraction::Absent,
    }
}

/// Captures the downlink RSRP.
///
/// Only consulted on identifier lines: the MAC statistics print RSRP on the
/// same physical line as `UE RNTI`. An RSRP printed on any other line is not
/// attributed to a UE.
pub fn extract_rsrp(line: &str) -> Extraction<i64> {
    gated(line, RSRP_MARKER, &RSRP_RE, |caps| capture(caps, 1))
}

/// Captures the wideband CQI from a `UE <id>: CQI <n>` line.
pub fn extract_cqi(line: &str) -> Extraction<i64> {
    gated(line, CQI_MARKER, &CQI_RE, |caps| capture(caps, 1))
}

/// Captures downlink BLER and MCS from a `dlsch_rounds` line.
pub fn extract_dlsch(line: &str) -> Extraction<ScheduleOutcome> {
    gated(line, DLSCH_MARKER, &DLSCH_RE, |caps| {
        Some(ScheduleOutcome {
            bler: capture(caps, 1)?,
            mcs: capture(caps, 2)?,
        })
    })
}

/// Captures uplink BLER and MCS from a `ulsch_rounds` line.
pub fn extract_ulsch(line: &str) -> Extraction<ScheduleOutcome> {
    gated(line, ULSCH_MARKER, &ULSCH_RE, |caps| {
        Some(ScheduleOutcome {
            bler: capture(caps, 5)?,
            mcs: capture(caps, 6)?,
        })
    })
}

/// Captures the TX/RX byte counters from a `MAC:` line.
pub fn extract_mac_bytes(line: &str) -> Extraction<ByteCounters> {
    gated(line, MAC_BYTES_MARKER, &MAC_BYTES_RE, |caps| {
        Some(ByteCounters {
            tx: capture(caps, 1)?,
            rx: capture(caps, 2)?,
        })
    })
}
