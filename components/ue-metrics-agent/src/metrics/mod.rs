//! Agent self metrics exposed in prometheus format.

pub mod http;
pub mod metrics;
