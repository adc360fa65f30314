//! Read path: fetch the last few seconds of `ue_metrics` back out of the
//! store, one row per timestamp with every field pivoted into a column.

// Local crates
use crate::influx::{
    client::{InfluxClient, InfluxError},
    point::UE_MEASUREMENT,
};

// External crates
use csv::{ReaderBuilder, StringRecord};
use std::io::{self, Write};
use tracing::instrument;

/// Fixed lookback of the inspection query.
pub const LOOKBACK: &str = "-3s";

/// Columns that are not printed. The unnamed first column is the CSV
/// annotation index.
const HIDDEN_COLUMNS: &[&str] = &["", "_start", "_stop", "_measurement"];

/// One pivoted row: the point timestamp plus every remaining column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRow {
    pub time: Option<String>,
    pub columns: Vec<(String, String)>,
}

impl QueryRow {
    #[cfg(test)]
    pub fn get(&self, column: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }
}

/// Flux query selecting recent `ue_metrics` points, pivoted on `_time`.
pub fn recent_metrics_flux(bucket: &str) -> String {
    format!(
        r#"from(bucket: "{bucket}")
    |> range(start: {LOOKBACK})
    |> filter(fn: (r) => r["_measurement"] == "{UE_MEASUREMENT}")
    |> pivot(rowKey:["_time"], columnKey: ["_field"], valueColumn: "_value")"#,
        bucket = bucket.replace('\\', "\\\\").replace('"', "\\\""),
    )
}

/// A header record starts every table: InfluxDB names its leading
/// bookkeeping columns `result` and `table`.
fn is_header(record: &StringRecord) -> bool {
    record.get(1) == Some("result") && record.get(2) == Some("table")
}

/// Decode an InfluxDB CSV response. Each table starts with its own header
/// record; annotation records (`#...`) and blank separator lines are skipped.
pub fn parse_csv(body: &str) -> Result<Vec<QueryRow>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .from_reader(body.as_bytes());

    let mut rows = Vec::new();
    let mut header: Option<StringRecord> = None;

    for result in reader.records() {
        let record = result?;
        if header.is_none() || is_header(&record) {
            header = Some(record);
            continue;
        }
        let Some(names) = header.as_ref() else {
            continue;
        };

        let mut row = QueryRow {
            time: None,
            columns: Vec::new(),
        };
        for (name, value) in names.iter().zip(record.iter()) {
            if name == "_time" {
                row.time = Some(value.to_string());
            }
            if !HIDDEN_COLUMNS.contains(&name) {
                row.columns.push((name.to_string(), value.to_string()));
            }
        }
        rows.push(row);
    }

    Ok(rows)
}

/// Print rows in the inspection format.
pub fn write_rows<W: Write>(out: &mut W, rows: &[QueryRow]) -> io::Result<()> {
    writeln!(out, "\nRecent Metrics (last 3 seconds):")?;
    if rows.is_empty() {
        writeln!(out, "No points found")?;
    }
    for row in rows {
        writeln!(out, "\nTimestamp: {}", row.time.as_deref().unwrap_or("unknown"))?;
        for (name, value) in &row.columns {
            writeln!(out, "{name}: {value}")?;
        }
    }
    Ok(())
}

/// Run the recent-metrics query against `client`.
#[instrument(
    name = "ue_metrics_query::recent",
    target = "influx::query",
    skip_all,
    level = "debug"
)]
pub async fn query_recent_metrics(client: &InfluxClient) -> Result<Vec<QueryRow>, InfluxError> {
    let flux = recent_metrics_flux(client.bucket());
    tracing::debug!(query = %flux, "Querying recent UE metrics");

    let csv = client.query_csv(&flux).await?;
    let rows = parse_csv(&csv)?;

    tracing::debug!(rows = rows.len(), "Recent UE metrics received");
    Ok(rows)
}
