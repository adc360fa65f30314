//! `ue-metrics` binary.

use anyhow::Result;
use ue_metrics_agent::cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Main entrypoint simply delegates control to CLI layer.
    // The CLI parses user commands, sets up tracing and calls into the appropriate logic
    cli::cli::run().await
}
