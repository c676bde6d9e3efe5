//! Plugin configuration.
//!
//! The configuration is a list of collectd-style items, stored as JSON:
//!
//! ```json
//! [
//!   { "key": "Server", "values": ["local"], "children": [
//!       { "key": "Socket", "values": ["/var/run/pdns.controlsocket"] }
//!   ] },
//!   { "key": "Recursor", "values": ["rec"], "children": [
//!       { "key": "Command", "values": ["get questions cache-hits"] }
//!   ] },
//!   { "key": "LocalSocket", "values": ["/var/run/pdnsstat-powerdns"] },
//!   { "key": "Timeout", "values": [5] }
//! ]
//! ```
//!
//! Keys are case-insensitive. A broken `Server`/`Recursor` block is skipped
//! without affecting the others.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, error};

use crate::collector::{CollectionTarget, LocalSocket, Registry, TargetKind};

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

/// One configuration item: key, values and nested items.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigItem {
    pub key: String,
    #[serde(default)]
    pub values: Vec<ConfigValue>,
    #[serde(default)]
    pub children: Vec<ConfigItem>,
}

impl ConfigItem {
    pub fn new(key: impl Into<String>, values: Vec<ConfigValue>) -> Self {
        Self {
            key: key.into(),
            values,
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<ConfigItem>) -> Self {
        self.children = children;
        self
    }

    fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

/// Error type for configuration failures.
#[derive(Debug)]
pub enum ConfigError {
    /// Configuration file could not be read.
    Io(std::io::Error),
    /// Configuration file is not valid JSON of the expected shape.
    Json(serde_json::Error),
    /// Block key is neither `Server` nor `Recursor`.
    UnknownTargetKind(String),
    /// Option not allowed in this position.
    UnknownOption(String),
    /// Option has the wrong number or type of values.
    InvalidArgument { key: String, expected: &'static str },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {}", e),
            ConfigError::Json(e) => write!(f, "config parse error: {}", e),
            ConfigError::UnknownTargetKind(key) => {
                write!(f, "unknown target kind '{}' (expected Server or Recursor)", key)
            }
            ConfigError::UnknownOption(key) => write!(f, "option '{}' not allowed here", key),
            ConfigError::InvalidArgument { key, expected } => {
                write!(f, "'{}' needs {}", key, expected)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Json(e)
    }
}

/// Reads a configuration file.
pub fn load_file(path: &Path) -> Result<Vec<ConfigItem>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

pub fn parse_str(content: &str) -> Result<Vec<ConfigItem>, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

/// Builds a registry from top-level items, logging and skipping bad ones.
pub fn build_registry(items: &[ConfigItem]) -> Registry {
    let mut registry = Registry::default();
    for e in apply(&mut registry, items) {
        error!("config: {}", e);
    }
    registry
}

/// Applies top-level items to `registry`. Returns the errors of the items
/// that were skipped.
pub fn apply(registry: &mut Registry, items: &[ConfigItem]) -> Vec<ConfigError> {
    let mut errors = Vec::new();

    for item in items {
        let result = if item.is("Server") || item.is("Recursor") {
            parse_target(item).map(|target| registry.add(target))
        } else if item.is("LocalSocket") {
            string_arg(item).map(|path| {
                debug!("local socket: {}", path);
                registry.set_local_socket(LocalSocket::new(path));
            })
        } else if item.is("Timeout") {
            timeout_arg(item).map(|timeout| registry.set_timeout(Some(timeout)))
        } else {
            Err(ConfigError::UnknownOption(item.key.clone()))
        };

        if let Err(e) = result {
            errors.push(e);
        }
    }

    errors
}

/// Maps a block key to a target kind.
pub fn parse_target_kind(key: &str) -> Result<TargetKind, ConfigError> {
    TargetKind::from_key(key).ok_or_else(|| ConfigError::UnknownTargetKind(key.to_string()))
}

/// Builds one target from a `Server` or `Recursor` block.
pub fn parse_target(item: &ConfigItem) -> Result<CollectionTarget, ConfigError> {
    let kind = parse_target_kind(&item.key)?;
    let instance = string_arg(item)?;
    let mut target = CollectionTarget::new(kind, instance);

    for option in &item.children {
        if option.is("Command") {
            target = target.with_command(string_arg(option)?);
        } else if option.is("Socket") {
            target = target.with_socket(string_arg(option)?);
        } else {
            return Err(ConfigError::UnknownOption(option.key.clone()));
        }
    }

    Ok(target)
}

fn string_arg(item: &ConfigItem) -> Result<&str, ConfigError> {
    match item.values.as_slice() {
        [ConfigValue::String(s)] => Ok(s.as_str()),
        _ => Err(ConfigError::InvalidArgument {
            key: item.key.clone(),
            expected: "exactly one string argument",
        }),
    }
}

fn timeout_arg(item: &ConfigItem) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidArgument {
        key: item.key.clone(),
        expected: "exactly one non-negative number of seconds",
    };
    match item.values.as_slice() {
        [ConfigValue::Number(secs)] => Duration::try_from_secs_f64(*secs).map_err(|_| invalid()),
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{DEFAULT_TIMEOUT, RECURSOR_COMMAND, RECURSOR_SOCKET, SERVER_COMMAND};
    use std::path::PathBuf;

    fn s(v: &str) -> ConfigValue {
        ConfigValue::String(v.to_string())
    }

    #[test]
    fn test_parse_json() {
        let items = parse_str(
            r#"[
                {"key": "Server", "values": ["auth"], "children": [
                    {"key": "Socket", "values": ["/tmp/pdns.sock"]}
                ]},
                {"key": "Timeout", "values": [2.5]},
                {"key": "Enabled", "values": [true]}
            ]"#,
        )
        .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].values, vec![s("auth")]);
        assert_eq!(items[0].children[0].key, "Socket");
        assert_eq!(items[1].values, vec![ConfigValue::Number(2.5)]);
        assert_eq!(items[2].values, vec![ConfigValue::Boolean(true)]);
        assert!(items[2].children.is_empty());
    }

    #[test]
    fn test_parse_json_invalid() {
        assert!(matches!(parse_str("{not json"), Err(ConfigError::Json(_))));
        assert!(matches!(parse_str(r#"[{"values": []}]"#), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_target_defaults() {
        let server = parse_target(&ConfigItem::new("server", vec![s("a")])).unwrap();
        assert_eq!(server.kind(), TargetKind::Server);
        assert_eq!(server.instance(), "a");
        assert_eq!(server.command(), SERVER_COMMAND);

        let recursor = parse_target(&ConfigItem::new("Recursor", vec![s("r")])).unwrap();
        assert_eq!(recursor.command(), RECURSOR_COMMAND);
        assert_eq!(recursor.socket(), Path::new(RECURSOR_SOCKET));
    }

    #[test]
    fn test_target_overrides() {
        let item = ConfigItem::new("Recursor", vec![s("r")]).with_children(vec![
            ConfigItem::new("COMMAND", vec![s("get questions")]),
            ConfigItem::new("socket", vec![s("/tmp/rec.sock")]),
        ]);
        let target = parse_target(&item).unwrap();
        assert_eq!(target.command(), "get questions");
        assert_eq!(target.socket(), PathBuf::from("/tmp/rec.sock"));
    }

    #[test]
    fn test_target_errors() {
        let err = parse_target(&ConfigItem::new("Resolver", vec![s("x")])).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownTargetKind(_)));

        let err = parse_target(&ConfigItem::new("Server", vec![])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArgument { .. }));

        let err =
            parse_target(&ConfigItem::new("Server", vec![ConfigValue::Number(1.0)])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArgument { .. }));

        let item = ConfigItem::new("Server", vec![s("a")])
            .with_children(vec![ConfigItem::new("Socket", vec![s("/a"), s("/b")])]);
        assert!(matches!(
            parse_target(&item),
            Err(ConfigError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_unknown_child_skips_only_that_block() {
        let items = vec![
            ConfigItem::new("Server", vec![s("bad")])
                .with_children(vec![ConfigItem::new("Port", vec![s("53")])]),
            ConfigItem::new("Server", vec![s("good")]),
        ];
        let mut registry = Registry::default();
        let errors = apply(&mut registry, &items);

        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], ConfigError::UnknownOption(k) if k == "Port"));
        let instances: Vec<&str> = registry.iter().map(|t| t.instance()).collect();
        assert_eq!(instances, vec!["good"]);
    }

    #[test]
    fn test_top_level_options() {
        let items = vec![
            ConfigItem::new("LocalSocket", vec![s("/tmp/local.sock")]),
            ConfigItem::new("Timeout", vec![ConfigValue::Number(3.0)]),
            ConfigItem::new("Interval", vec![ConfigValue::Number(10.0)]),
            ConfigItem::new("Recursor", vec![s("rec")]),
        ];
        let mut registry = Registry::default();
        assert_eq!(registry.timeout(), Some(DEFAULT_TIMEOUT));

        let errors = apply(&mut registry, &items);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].to_string(), "option 'Interval' not allowed here");
        assert_eq!(registry.local_socket().path(), Path::new("/tmp/local.sock"));
        assert_eq!(registry.timeout(), Some(Duration::from_secs(3)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_timeout() {
        let mut registry = Registry::default();
        let items: Vec<ConfigItem> = [-1.0, 1e20, f64::NAN, f64::INFINITY]
            .into_iter()
            .map(|secs| ConfigItem::new("Timeout", vec![ConfigValue::Number(secs)]))
            .chain([ConfigItem::new("Timeout", vec![s("5")])])
            .collect();
        let errors = apply(&mut registry, &items);
        assert_eq!(errors.len(), 5);
        assert!(
            errors
                .iter()
                .all(|e| matches!(e, ConfigError::InvalidArgument { key, .. } if key == "Timeout"))
        );
        assert_eq!(registry.timeout(), Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdnsstat.json");
        std::fs::write(
            &path,
            r#"[{"key": "Server", "values": ["a"]}, {"key": "Recursor", "values": ["b"]}]"#,
        )
        .unwrap();

        let registry = build_registry(&load_file(&path).unwrap());
        assert_eq!(registry.len(), 2);

        assert!(matches!(
            load_file(&dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
