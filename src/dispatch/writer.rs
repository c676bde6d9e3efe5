//! Dispatcher that writes observations to an output stream.

use std::io::Write;
use std::time::Duration;

use super::{DataSet, DispatchError, Dispatcher, TypesDb, Value, ValueList};

/// Line format of emitted observations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// collectd plain-text protocol `PUTVAL` lines.
    Putval,
}

/// Writes each observation as one line to `out`.
pub struct WriterDispatcher<W: Write> {
    types: TypesDb,
    out: W,
    format: OutputFormat,
    interval: Option<Duration>,
}

impl<W: Write> WriterDispatcher<W> {
    pub fn new(types: TypesDb, out: W, format: OutputFormat) -> Self {
        Self {
            types,
            out,
            format,
            interval: None,
        }
    }

    /// Adds `interval=<secs>` to `PUTVAL` lines.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Consumes the dispatcher, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn format_putval(&self, vl: &ValueList) -> String {
        let values: Vec<String> = vl.values.iter().map(format_value).collect();
        match self.interval {
            Some(interval) => format!(
                "PUTVAL \"{}\" interval={} {}:{}",
                vl.identifier(),
                interval.as_secs(),
                vl.time,
                values.join(":")
            ),
            None => format!(
                "PUTVAL \"{}\" {}:{}",
                vl.identifier(),
                vl.time,
                values.join(":")
            ),
        }
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Gauge(g) if g.is_nan() => "U".to_string(),
        Value::Gauge(g) => g.to_string(),
        Value::Counter(c) | Value::Absolute(c) => c.to_string(),
        Value::Derive(d) => d.to_string(),
    }
}

impl<W: Write> Dispatcher for WriterDispatcher<W> {
    fn data_set(&self, type_name: &str) -> Option<&DataSet> {
        self.types.get(type_name)
    }

    fn dispatch(&mut self, vl: &ValueList) -> Result<(), DispatchError> {
        let line = match self.format {
            OutputFormat::Json => serde_json::to_string(vl)?,
            OutputFormat::Putval => self.format_putval(vl),
        };
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}
