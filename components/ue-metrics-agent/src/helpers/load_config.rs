// External crates
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::instrument;
use url::Url;

/// Prefix for environment overrides, e.g. `UE_METRICS_INFLUXDB__TOKEN`.
pub const ENV_PREFIX: &str = "UE_METRICS";
const ENV_NESTING_SEPARATOR: &str = "__";

/// Configuration errors surfaced by [`Config::validate`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required configuration value `{0}`")]
    Missing(&'static str),
    #[error("invalid InfluxDB url `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("`{0}` must be greater than zero")]
    ZeroInterval(&'static str),
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub influxdb: InfluxConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: Option<MetricsConfig>,
}

/// Connection details for the metrics store. All four values are required.
#[derive(Deserialize, Clone, Default)]
pub struct InfluxConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub org: String,
    #[serde(default)]
    pub bucket: String,
}

impl fmt::Debug for InfluxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InfluxConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
    #[serde(default = "default_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub retry_delay_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            poll_interval_ms: default_interval_ms(),
            retry_delay_ms: default_interval_ms(),
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Directory for the daily rolling log file. Logs go to stderr only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            json: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    /// Address for the prometheus `/metrics` endpoint, e.g. `0.0.0.0:9000`.
    pub listen_addr: String,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("nrMAC_stats.log")
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load the configuration file at `path` (optional) and layer
    /// `UE_METRICS_*` environment variables on top of it.
    #[instrument(
        name = "ue_metrics_config::load",
        target = "helpers::load_config",
        level = "trace",
        skip_all
    )]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_sources(path.as_ref(), None)
    }

    /// Same as [`Config::load`], reading overrides from `env` instead of the
    /// process environment when given.
    pub fn from_sources(path: &Path, env: Option<HashMap<String, String>>) -> Result<Self> {
        tracing::trace!(
            configuration_file_path = %path.display(),
            "Loading UE metrics agent configuration"
        );

        let settings = config::Config::builder()
            .add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator(ENV_NESTING_SEPARATOR)
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;

        let config: Config = settings
            .try_deserialize()
            .with_context(|| format!("Failed to parse configuration from {:?}", path))?;

        tracing::trace!(
            configuration_file_path = %path.display(),
            "UE metrics agent configuration loaded"
        );
        Ok(config)
    }

    /// Checks the store connection settings and intervals. Run once at startup
    /// before any component is built from this config.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_influx()?;
        self.validate_monitor()
    }

    /// Store settings only. Every value is required.
    pub fn validate_influx(&self) -> Result<(), ConfigError> {
        let influx = &self.influxdb;
        for (key, value) in [
            ("influxdb.url", &influx.url),
            ("influxdb.token", &influx.token),
            ("influxdb.org", &influx.org),
            ("influxdb.bucket", &influx.bucket),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(key));
            }
        }

        let parsed = Url::parse(&influx.url).map_err(|e| ConfigError::InvalidUrl {
            url: influx.url.clone(),
            reason: e.to_string(),
        })?;
        // The HTTP client is built without a TLS connector.
        if parsed.scheme() != "http" {
            return Err(ConfigError::InvalidUrl {
                url: influx.url.clone(),
                reason: format!("unsupported scheme `{}`, expected `http`", parsed.scheme()),
            });
        }
        Ok(())
    }

    pub fn validate_monitor(&self) -> Result<(), ConfigError> {
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::ZeroInterval("monitor.poll_interval_ms"));
        }
        if self.monitor.retry_delay_ms == 0 {
            return Err(ConfigError::ZeroInterval("monitor.retry_delay_ms"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    const FULL: &str = r#"
[influxdb]
url = "http://localhost:8086"
token = "secret"
org = "wines"
bucket = "oai"

[monitor]
log_file = "/var/log/oai/nrMAC_stats.log"
poll_interval_ms = 500
"#;

    #[test]
    fn loads_file_with_defaults() {
        let file = write_config(FULL);
        let cfg = Config::from_sources(file.path(), env(&[])).unwrap();

        assert_eq!(cfg.influxdb.bucket, "oai");
        assert_eq!(cfg.monitor.log_file, PathBuf::from("/var/log/oai/nrMAC_stats.log"));
        assert_eq!(cfg.monitor.poll_interval(), Duration::from_millis(500));
        assert_eq!(cfg.monitor.retry_delay(), Duration::from_secs(1));
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.metrics.is_none());
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn environment_overrides_file() {
        let file = write_config(FULL);
        let cfg = Config::from_sources(
            file.path(),
            env(&[
                ("UE_METRICS_INFLUXDB__TOKEN", "from-env"),
                ("UE_METRICS_MONITOR__RETRY_DELAY_MS", "2500"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.influxdb.token, "from-env");
        assert_eq!(cfg.influxdb.org, "wines");
        assert_eq!(cfg.monitor.retry_delay_ms, 2500);
    }

    #[test]
    fn environment_alone_is_enough() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::from_sources(
            &dir.path().join("absent.toml"),
            env(&[
                ("UE_METRICS_INFLUXDB__URL", "http://influxdb.example.net:8086"),
                ("UE_METRICS_INFLUXDB__TOKEN", "t"),
                ("UE_METRICS_INFLUXDB__ORG", "o"),
                ("UE_METRICS_INFLUXDB__BUCKET", "b"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.monitor.log_file, PathBuf::from("nrMAC_stats.log"));
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn missing_bucket_is_rejected() {
        let file = write_config(&FULL.replace("bucket = \"oai\"", "bucket = \"\""));
        let cfg = Config::from_sources(file.path(), env(&[])).unwrap();

        assert_eq!(cfg.validate(), Err(ConfigError::Missing("influxdb.bucket")));
    }

    #[test]
    fn every_required_field_is_checked() {
        let cfg = Config::default();
        assert_eq!(cfg.validate(), Err(ConfigError::Missing("influxdb.url")));

        let mut cfg = Config::default();
        cfg.influxdb.url = "http://localhost:8086".into();
        cfg.influxdb.token = "t".into();
        cfg.influxdb.bucket = "b".into();
        assert_eq!(cfg.validate(), Err(ConfigError::Missing("influxdb.org")));
    }

    #[test]
    fn rejects_non_http_urls_and_zero_intervals() {
        let mut cfg = Config::default();
        cfg.influxdb = InfluxConfig {
            url: "https://localhost".into(),
            token: "t".into(),
            org: "o".into(),
            bucket: "b".into(),
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidUrl { .. })));

        cfg.influxdb.url = "http://localhost:8086".into();
        cfg.monitor.poll_interval_ms = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroInterval("monitor.poll_interval_ms"))
        );
    }

    #[test]
    fn monitor_settings_validate_without_store() {
        let cfg = Config::default();
        assert_eq!(cfg.validate_monitor(), Ok(()));
        assert!(cfg.validate_influx().is_err());
    }

    #[test]
    fn debug_output_redacts_token() {
        let cfg = InfluxConfig {
            token: "super-secret".into(),
            ..Default::default()
        };
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
