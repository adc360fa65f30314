//! Log parsing: per-line pattern extraction and the per-UE accumulator.

/// Attributes lines to UEs and builds the per-scan mapping.
pub mod accumulator;
/// Single line pattern matching.
pub mod extractor;
/// Per-UE metric records.
pub mod models;
