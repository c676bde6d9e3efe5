//! Metric kind schemas in collectd `types.db` format.
//!
//! A `types.db` line looks like:
//!
//! ```text
//! # comment
//! cache_result   value:DERIVE:0:U
//! io_packets     rx:DERIVE:0:U, tx:DERIVE:0:U
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use super::{DataSet, DataSource, DsType};

/// Error type for `types.db` loading failures.
#[derive(Debug)]
pub enum TypesDbError {
    /// File could not be read.
    Io(std::io::Error),
    /// Malformed line (1-based line number, reason).
    Parse { line: usize, message: String },
}

impl std::fmt::Display for TypesDbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypesDbError::Io(e) => write!(f, "types.db I/O error: {}", e),
            TypesDbError::Parse { line, message } => {
                write!(f, "types.db line {}: {}", line, message)
            }
        }
    }
}

impl std::error::Error for TypesDbError {}

impl From<std::io::Error> for TypesDbError {
    fn from(e: std::io::Error) -> Self {
        TypesDbError::Io(e)
    }
}

/// Registry of metric kind schemas keyed by type name.
#[derive(Debug, Clone, Default)]
pub struct TypesDb {
    sets: BTreeMap<String, DataSet>,
}

impl TypesDb {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schemas for every metric kind the lookup table references.
    pub fn builtin() -> Self {
        let mut db = Self::new();
        for (name, kind, max) in [
            ("cache_result", DsType::Derive, None),
            ("cache_size", DsType::Gauge, Some(1_000_000_000.0)),
            ("counter", DsType::Counter, None),
            ("cpu", DsType::Derive, None),
            ("dns_answer", DsType::Derive, None),
            ("dns_qtype", DsType::Derive, None),
            ("dns_question", DsType::Derive, None),
            ("dns_rcode", DsType::Derive, None),
            ("latency", DsType::Gauge, None),
        ] {
            let min = if kind == DsType::Counter { None } else { Some(0.0) };
            db.insert(DataSet {
                type_name: name.to_string(),
                sources: vec![DataSource {
                    name: "value".to_string(),
                    kind,
                    min,
                    max,
                }],
            });
        }
        db.insert(DataSet {
            type_name: "io_packets".to_string(),
            sources: ["rx", "tx"]
                .into_iter()
                .map(|name| DataSource {
                    name: name.to_string(),
                    kind: DsType::Derive,
                    min: Some(0.0),
                    max: None,
                })
                .collect(),
        });
        db
    }

    /// Reads and parses a `types.db` file.
    pub fn load(path: &Path) -> Result<Self, TypesDbError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses `types.db` content.
    pub fn parse(content: &str) -> Result<Self, TypesDbError> {
        let mut db = Self::new();
        for (idx, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let set = parse_line(line).map_err(|message| TypesDbError::Parse {
                line: idx + 1,
                message,
            })?;
            db.insert(set);
        }
        Ok(db)
    }

    /// Adds or replaces a schema.
    pub fn insert(&mut self, set: DataSet) {
        self.sets.insert(set.type_name.clone(), set);
    }

    /// Overlays `other` on top of this registry; entries in `other` win.
    pub fn merge(&mut self, other: TypesDb) {
        self.sets.extend(other.sets);
    }

    pub fn get(&self, type_name: &str) -> Option<&DataSet> {
        self.sets.get(type_name)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }
}

fn parse_line(line: &str) -> Result<DataSet, String> {
    let (name, rest) = line
        .split_once(|c: char| c.is_ascii_whitespace())
        .ok_or_else(|| format!("missing data sources for '{}'", line))?;

    let mut sources = Vec::new();
    for spec in rest.split(',') {
        let spec = spec.trim();
        if spec.is_empty() {
            continue;
        }
        sources.push(parse_source(spec)?);
    }
    if sources.is_empty() {
        return Err(format!("missing data sources for '{}'", name));
    }

    Ok(DataSet {
        type_name: name.to_string(),
        sources,
    })
}

fn parse_source(spec: &str) -> Result<DataSource, String> {
    let fields: Vec<&str> = spec.split(':').collect();
    if fields.len() != 4 {
        return Err(format!(
            "data source '{}': expected name:type:min:max, got {} fields",
            spec,
            fields.len()
        ));
    }
    let kind = DsType::from_name(fields[1])
        .ok_or_else(|| format!("data source '{}': unknown type '{}'", spec, fields[1]))?;

    Ok(DataSource {
        name: fields[0].to_string(),
        kind,
        min: parse_bound(fields[2])?,
        max: parse_bound(fields[3])?,
    })
}

fn parse_bound(s: &str) -> Result<Option<f64>, String> {
    if s.eq_ignore_ascii_case("U") {
        return Ok(None);
    }
    s.parse::<f64>()
        .map(Some)
        .map_err(|_| format!("invalid bound '{}'", s))
}
