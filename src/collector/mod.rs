//! PowerDNS statistics collector.
//!
//! Polls the control sockets of PowerDNS authoritative servers and recursors,
//! decodes their replies and turns known statistics into observations.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          Registry                            │
//! │   CollectionTarget (Server)      CollectionTarget (Recursor) │
//! │            │                                │                │
//! │     ┌──────▼───────┐                 ┌──────▼───────┐        │
//! │     │ fetch_stream │                 │fetch_datagram│◄─ LocalSocket
//! │     └──────┬───────┘                 └──────┬───────┘        │
//! │     ┌──────▼────────────┐        ┌──────────▼───────────┐    │
//! │     │parse_server_reply │        │ parse_recursor_reply │    │
//! │     └──────┬────────────┘        └──────────┬───────────┘    │
//! │            └──────────────┬─────────────────┘                │
//! │                    ┌──────▼──────┐                           │
//! │                    │   submit    │── resolve (lookup table)  │
//! │                    └──────┬──────┘                           │
//! └───────────────────────────┼──────────────────────────────────┘
//!                      ┌──────▼──────┐
//!                      │ Dispatcher  │ (trait)
//!                      └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use pdnsstat::collector::{CollectionTarget, Registry, TargetKind};
//! use pdnsstat::dispatch::MemoryDispatcher;
//!
//! let mut registry = Registry::default();
//! registry.add(CollectionTarget::new(TargetKind::Server, "local"));
//!
//! let mut dispatcher = MemoryDispatcher::new();
//! let report = registry.read_all(&mut dispatcher, "localhost");
//! println!("{} observations", report.dispatched);
//! ```

pub mod lookup;
pub mod parser;
mod registry;
pub mod submit;
mod target;
pub mod transport;

pub use lookup::{LookupEntry, resolve};
pub use parser::{RawStat, parse_recursor_reply, parse_server_reply};
pub use registry::{CycleReport, DEFAULT_TIMEOUT, Registry};
pub use submit::{Submission, SubmitError, submit};
pub use target::{
    CollectionTarget, RECURSOR_COMMAND, RECURSOR_SOCKET, SERVER_COMMAND, SERVER_SOCKET,
    TargetKind, TargetStats,
};
pub use transport::{LocalSocket, Reply, TransportError, TransportKind, fetch};
