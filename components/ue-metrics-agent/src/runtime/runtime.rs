// Local crates
use crate::{
    helpers::{load_config::Config, shutdown::Shutdown},
    influx::client::InfluxClient,
    metrics::http::{bind_metrics_listener, serve_metrics},
    sink::console::ConsoleSink,
    watcher::watcher::Watcher,
};

// External crates
use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{info, instrument};

/// Flags of the `run` command that are not part of the config file.
#[derive(Debug, Default, Clone)]
pub struct RunOptions {
    /// Overrides `monitor.log_file`.
    pub log_file: Option<PathBuf>,
    /// Print points as line protocol instead of writing them to InfluxDB.
    pub dry_run: bool,
}

/// Agent runtime initialization and setup.
///
/// Validates `config`, starts the optional metrics endpoint, checks the
/// bucket and then polls until `shutdown` is triggered. A missing bucket or
/// an unreachable store is fatal.
#[instrument(
    name = "ue_metrics_runtime::run",
    target = "runtime::runtime",
    skip_all,
    fields(dry_run = options.dry_run),
    level = "debug"
)]
pub async fn run_monitor(mut config: Config, options: RunOptions, shutdown: Shutdown) -> Result<()> {
    if let Some(log_file) = options.log_file {
        config.monitor.log_file = log_file;
    }

    config.validate_monitor()?;
    if !options.dry_run {
        config.validate_influx()?;
    }

    if let Some(metrics) = &config.metrics {
        let listener = bind_metrics_listener(&metrics.listen_addr).await?;
        let token = shutdown.token();
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(listener, token).await {
                tracing::error!(error = %e, "Metrics endpoint stopped");
            }
        });
    }

    if options.dry_run {
        info!("Dry run: points are printed to stdout, InfluxDB is not contacted");
        let mut watcher = Watcher::new(config.monitor, ConsoleSink::stdout());
        watcher.run(&shutdown).await;
        return Ok(());
    }

    let client = InfluxClient::new(&config.influxdb).context("Failed to build InfluxDB client")?;
    if let Err(e) = client.verify_bucket().await {
        tracing::error!(
            bucket = %config.influxdb.bucket,
            url = %client.url(),
            error = %e,
            "Failed to connect to InfluxDB"
        );
        return Err(e).context("InfluxDB bucket check failed");
    }
    info!("Connected to InfluxDB, bucket '{}' found", client.bucket());

    let mut watcher = Watcher::new(config.monitor, client);
    watcher.run(&shutdown).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::load_config::{InfluxConfig, MonitorConfig};
    use crate::influx::client::test_server::{Recorded, spawn};
    use hyper::StatusCode;
    use std::sync::Arc;
    use std::time::Duration;

    const ONE_UE: &str = "\
UE RNTI a37f: average RSRP -75
UE a37f: CQI 11
UE a37f: dlsch_rounds 1/0/0/0, BLER 0.02 MCS 9
UE a37f: ulsch_rounds 1/0/0/0, BLER 0.01 MCS 8
UE a37f: MAC: TX 1000 RX 500 bytes
";

    fn config(url: String, log_file: PathBuf) -> Config {
        Config {
            influxdb: InfluxConfig {
                url,
                token: "t".into(),
                org: "wines".into(),
                bucket: "oai".into(),
            },
            monitor: MonitorConfig {
                log_file,
                poll_interval_ms: 10,
                retry_delay_ms: 10,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn missing_bucket_is_fatal() {
        let (addr, log) =
            spawn(Arc::new(|_: &Recorded| (StatusCode::OK, r#"{"buckets":[]}"#.to_string()))).await;
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(format!("http://{addr}"), dir.path().join("nrMAC_stats.log"));

        let result = run_monitor(cfg, RunOptions::default(), Shutdown::new()).await;

        assert!(result.is_err());
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log[0].path_and_query.starts_with("/api/v2/buckets?"));
    }

    #[tokio::test]
    async fn writes_snapshot_after_bucket_check() {
        let (addr, log) = spawn(Arc::new(|req: &Recorded| {
            if req.path_and_query.starts_with("/api/v2/buckets") {
                (StatusCode::OK, r#"{"buckets":[{"name":"oai"}]}"#.to_string())
            } else {
                (StatusCode::NO_CONTENT, String::new())
            }
        }))
        .await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrMAC_stats.log");
        std::fs::write(&path, ONE_UE).unwrap();

        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        let run = tokio::spawn(run_monitor(
            config(format!("http://{addr}"), path),
            RunOptions::default(),
            shutdown,
        ));

        for _ in 0..200 {
            if log.lock().unwrap().len() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        trigger.trigger();
        run.await.unwrap().unwrap();

        let log = log.lock().unwrap();
        let writes: Vec<_> = log
            .iter()
            .filter(|r| r.path_and_query.starts_with("/api/v2/write"))
            .collect();
        assert_eq!(writes.len(), 2);
        assert!(writes[0].body.contains("direction=downlink"));
        assert!(writes[1].body.contains("direction=uplink"));
    }

    #[tokio::test]
    async fn dry_run_needs_no_store_settings() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::default();
        cfg.monitor.log_file = dir.path().join("nrMAC_stats.log");
        let shutdown = Shutdown::new();
        shutdown.trigger();

        let options = RunOptions {
            log_file: None,
            dry_run: true,
        };
        run_monitor(cfg, options, shutdown).await.unwrap();
    }

    #[tokio::test]
    async fn invalid_store_settings_fail_before_polling() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(String::new(), dir.path().join("nrMAC_stats.log"));

        let err = run_monitor(cfg, RunOptions::default(), Shutdown::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("influxdb.url"));
    }
}
