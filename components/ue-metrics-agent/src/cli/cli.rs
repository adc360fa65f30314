// Local crates
use crate::{
    helpers::{
        load_config::{Config, LoggingConfig},
        shutdown::Shutdown,
    },
    influx::{
        client::InfluxClient,
        query::{query_recent_metrics, write_rows},
    },
    instrumentation,
    parser::accumulator::scan_file,
    runtime::runtime::{RunOptions, run_monitor},
};

// External crates
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

const DEFAULT_CONFIG: &str = "ue_metrics.toml";

#[derive(Parser)]
#[command(
    name = "ue-metrics",
    long_about = "Follows the OAI gNB MAC statistics log, extracts per-UE radio metrics and ships them to InfluxDB.",
    about = "Per-UE radio metrics exporter for OAI base stations",
    version,
    term_width = 100,
    after_help = "\
    EXAMPLES:
        ue-metrics run --config /etc/ue_metrics.toml
        ue-metrics run --log-file ./nrMAC_stats.log --dry-run
        ue-metrics query --config ./ue_metrics.toml
        ue-metrics parse ./nrMAC_stats.log"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Monitor the MAC statistics log and push UE metrics
    Run {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// Log file to follow, overrides `monitor.log_file`
        #[arg(short, long)]
        log_file: Option<PathBuf>,
        /// Print points to stdout instead of writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// Print UE metrics written during the last 3 seconds
    Query {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Scan a log file once and print the extracted metrics as JSON
    Parse { file: PathBuf },

    /// Validate the configuration file before running
    Validate {
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
    },

    /// Display version information
    Version,
}

/// Entry function for CLI
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            log_file,
            dry_run,
        } => {
            let cfg = Config::load(&config)?;
            let _guard = instrumentation::tracing::init_tracing(&cfg.logging)?;
            instrumentation::tracing::init_panic_handler();

            let shutdown = Shutdown::new();
            shutdown.listen_for_signals();
            run_monitor(cfg, RunOptions { log_file, dry_run }, shutdown).await?
        }
        Commands::Query { config } => {
            let cfg = Config::load(&config)?;
            let _guard = instrumentation::tracing::init_tracing(&cfg.logging)?;
            show_recent_metrics(cfg).await?
        }
        Commands::Parse { file } => {
            let _guard = instrumentation::tracing::init_tracing(&LoggingConfig::default())?;
            parse_once(file).await?
        }
        Commands::Validate { config } => validate_config(config)?,
        Commands::Version => show_version(),
    }

    Ok(())
}

//
// ------------------------ Command Implementations ------------------------------
//

async fn show_recent_metrics(cfg: Config) -> Result<()> {
    cfg.validate_influx()?;
    let client = InfluxClient::new(&cfg.influxdb)?;

    let rows = match query_recent_metrics(&client).await {
        Ok(rows) => rows,
        Err(e) => {
            eprintln!("Error querying InfluxDB: {e}");
            return Err(e).context("Query failed");
        }
    };

    let mut out = std::io::stdout().lock();
    write_rows(&mut out, &rows)?;
    out.flush()?;
    Ok(())
}

async fn parse_once(file: PathBuf) -> Result<()> {
    let snapshot = scan_file(&file).await?;
    let json = serde_json::to_string_pretty(&snapshot.metrics)?;
    println!("{json}");
    eprintln!(
        "{} lines, {} UEs, {} malformed metric lines",
        snapshot.report.lines,
        snapshot.metrics.len(),
        snapshot.report.malformed_lines
    );
    Ok(())
}

/// Validate configuration file
fn validate_config(config: PathBuf) -> Result<()> {
    println!("Validating configuration file: {:?}", config);
    let cfg = Config::load(&config)?;
    cfg.validate()
        .with_context(|| format!("Invalid configuration in {:?}", config))?;
    println!("Configuration valid:\n{:#?}", cfg);
    Ok(())
}

/// Show version information
fn show_version() {
    println!("UE metrics agent {}", env!("CARGO_PKG_VERSION"));
}
