//! Metric dispatch: observation model, schema lookup and output sinks.
//!
//! The collector does not decide how observations are stored or shipped.
//! It talks to a [`Dispatcher`], which answers two questions:
//!
//! - what does a metric kind look like (`data_set`), so raw values can be
//!   converted to the right numeric representation;
//! - where does a finished [`ValueList`] go (`dispatch`).
//!
//! ```text
//!   submit() ──► Dispatcher::data_set("cache_result") ──► DataSet (TypesDb)
//!      │
//!      └──────► Dispatcher::dispatch(&ValueList) ──► WriterDispatcher (stdout)
//!                                                └─► MemoryDispatcher (tests)
//! ```

pub mod memory;
pub mod types_db;
pub mod writer;

use serde::Serialize;

pub use memory::MemoryDispatcher;
pub use types_db::{TypesDb, TypesDbError};
pub use writer::{OutputFormat, WriterDispatcher};

/// Plugin name stamped on every observation.
pub const PLUGIN_NAME: &str = "powerdns";

/// Data source type, as declared in a `types.db` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DsType {
    Counter,
    Gauge,
    Derive,
    Absolute,
}

impl DsType {
    /// Parses the type column of a `types.db` line (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNTER" => Some(DsType::Counter),
            "GAUGE" => Some(DsType::Gauge),
            "DERIVE" => Some(DsType::Derive),
            "ABSOLUTE" => Some(DsType::Absolute),
            _ => None,
        }
    }
}

/// One data source of a metric kind.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSource {
    pub name: String,
    pub kind: DsType,
    /// Lower bound, `None` if unbounded.
    pub min: Option<f64>,
    /// Upper bound, `None` if unbounded.
    pub max: Option<f64>,
}

/// Schema of a metric kind: its name and ordered data sources.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    pub type_name: String,
    pub sources: Vec<DataSource>,
}

impl DataSet {
    /// Number of values an observation of this kind carries.
    pub fn arity(&self) -> usize {
        self.sources.len()
    }
}

/// A single converted value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Counter(u64),
    Gauge(f64),
    Derive(i64),
    Absolute(u64),
}

/// One metric observation, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueList {
    /// Wall-clock time of the observation (seconds since epoch).
    pub time: i64,
    pub host: String,
    pub plugin: String,
    pub plugin_instance: String,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_instance: Option<String>,
    pub values: Vec<Value>,
}

impl ValueList {
    /// collectd-style identifier: `host/plugin-instance/type-type_instance`.
    pub fn identifier(&self) -> String {
        let mut id = format!("{}/{}", self.host, self.plugin);
        if !self.plugin_instance.is_empty() {
            id.push('-');
            id.push_str(&self.plugin_instance);
        }
        id.push('/');
        id.push_str(&self.type_);
        if let Some(ti) = self.type_instance.as_deref().filter(|ti| !ti.is_empty()) {
            id.push('-');
            id.push_str(ti);
        }
        id
    }
}

/// Error returned by a dispatcher sink.
#[derive(Debug)]
pub enum DispatchError {
    /// Writing to the output failed.
    Io(std::io::Error),
    /// Serializing the observation failed.
    Serialize(serde_json::Error),
}

impl std::fmt::Display for DispatchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchError::Io(e) => write!(f, "dispatch I/O error: {}", e),
            DispatchError::Serialize(e) => write!(f, "dispatch serialization error: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {}

impl From<std::io::Error> for DispatchError {
    fn from(e: std::io::Error) -> Self {
        DispatchError::Io(e)
    }
}

impl From<serde_json::Error> for DispatchError {
    fn from(e: serde_json::Error) -> Self {
        DispatchError::Serialize(e)
    }
}

/// Host-side collaborator that knows metric schemas and accepts observations.
pub trait Dispatcher {
    /// Looks up the schema of a metric kind.
    fn data_set(&self, type_name: &str) -> Option<&DataSet>;

    /// Accepts one fully-formed observation.
    fn dispatch(&mut self, vl: &ValueList) -> Result<(), DispatchError>;
}
