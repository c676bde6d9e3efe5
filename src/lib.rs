//! pdnsstat - PowerDNS statistics collector library.
//!
//! Provides:
//! - `collector` — control socket transports, reply parsers, lookup table,
//!   targets and the collection cycle
//! - `dispatch` — observation model, schema registry and output sinks
//! - `config` — configuration loading into a target registry
//!
//! The `pdnsstatd` binary runs the collection loop.

pub mod collector;
pub mod config;
pub mod dispatch;
