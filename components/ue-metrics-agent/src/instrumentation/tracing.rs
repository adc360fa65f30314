// Local crates
use crate::helpers::load_config::LoggingConfig;

// External crates
use anyhow::{Context, Result};
use std::panic;
use tracing::error;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_error::ErrorLayer;
use tracing_subscriber::{Layer, filter::EnvFilter, fmt, prelude::*, registry::Registry};

const LOG_FILE_NAME: &str = "ue_metrics.log";

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `logging.level`. Events always go to stderr, so stdout
/// stays clean for command output. When `logging.directory` is set a daily
/// rolling file is added; keep the returned guard alive until exit or buffered
/// lines are lost.
pub fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level)
            .with_context(|| format!("Invalid log level `{}`", logging.level))?,
    };

    let mut layers = Vec::new();
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_timer(fmt::time::UtcTime::rfc_3339());
    if logging.json {
        layers.push(stderr_layer.json().boxed());
    } else {
        layers.push(stderr_layer.boxed());
    }

    let mut guard = None;
    if let Some(directory) = &logging.directory {
        let file_appender = rolling::daily(directory, LOG_FILE_NAME);
        let (non_blocking_writer, worker_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(worker_guard);

        let file_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(non_blocking_writer)
            .with_file(true)
            .with_line_number(true)
            .with_thread_ids(true)
            .with_target(false)
            .with_timer(fmt::time::UtcTime::rfc_3339());
        if logging.json {
            layers.push(file_layer.json().boxed());
        } else {
            layers.push(file_layer.boxed());
        }
    }

    let subscriber = Registry::default()
        .with(filter)
        .with(layers)
        .with(ErrorLayer::default());

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set global tracing subscriber")?;

    Ok(guard)
}

pub fn init_panic_handler() {
    panic::set_hook(Box::new(|panic_info| {
        let msg = match panic_info.payload().downcast_ref::<&str>() {
            Some(s) => (*s).to_string(),
            None => match panic_info.payload().downcast_ref::<String>() {
                Some(s) => s.clone(),
                None => "Unknown panic".to_string(),
            },
        };

        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown location".to_string());

        error!(
            message = %msg,
            location = %location,
            "Application panicked!"
        );
    }));
}
