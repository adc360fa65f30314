//! InfluxDB v2 integration: point encoding, HTTP client and the read path.

pub mod client;
pub mod point;
pub mod query;
