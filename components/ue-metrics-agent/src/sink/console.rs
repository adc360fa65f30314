// Local crates
use crate::{
    influx::point::Point,
    sink::sink::{MetricsSink, SinkError},
};

// External crates
use std::io::{self, Write};
use std::sync::Mutex;

/// Writes each point as a line of line protocol instead of shipping it.
/// Backs `run --dry-run`.
#[derive(Debug)]
pub struct ConsoleSink<W: Write> {
    out: Mutex<W>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<W: Write> MetricsSink for ConsoleSink<W> {
    fn name(&self) -> &str {
        "console"
    }

    async fn write_point(&self, point: &Point) -> Result<(), SinkError> {
        let mut out = self.out.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{}", point.to_line_protocol())?;
        out.flush()?;
        Ok(())
    }
}
