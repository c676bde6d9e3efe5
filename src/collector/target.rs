//! Configured PowerDNS instances and their collection cycle.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error};

use crate::collector::parser::{RawStat, parse_recursor_reply, parse_server_reply};
use crate::collector::submit::{Submission, submit};
use crate::collector::transport::{LocalSocket, TransportError, TransportKind, fetch};
use crate::dispatch::Dispatcher;

pub const SERVER_SOCKET: &str = "/var/run/pdns.controlsocket";
pub const SERVER_COMMAND: &str = "SHOW *";

pub const RECURSOR_SOCKET: &str = "/var/run/pdns_recursor.controlsocket";
pub const RECURSOR_COMMAND: &str = "get all-outqueries answers0-1 \
    answers100-1000 answers10-100 answers1-10 answers-slow cache-entries \
    cache-hits cache-misses chain-resends client-parse-errors \
    concurrent-queries dlg-only-drops ipv6-outqueries negcache-entries \
    noerror-answers nsset-invalidations nsspeeds-entries nxdomain-answers \
    outgoing-timeouts qa-latency questions resource-limits \
    server-parse-errors servfail-answers spoof-prevents sys-msec \
    tcp-client-overflow tcp-outqueries tcp-questions throttled-out \
    throttled-outqueries throttle-entries unauthorized-tcp unauthorized-udp \
    unexpected-packets unreachables user-msec";

/// PowerDNS role of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    /// Authoritative server: stream socket, `name=value,` replies.
    Server,
    /// Recursor: datagram socket, positional replies.
    Recursor,
}

impl TargetKind {
    /// Matches a configuration block key, ignoring case.
    pub fn from_key(key: &str) -> Option<Self> {
        if key.eq_ignore_ascii_case("Server") {
            Some(TargetKind::Server)
        } else if key.eq_ignore_ascii_case("Recursor") {
            Some(TargetKind::Recursor)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TargetKind::Server => "server",
            TargetKind::Recursor => "recursor",
        }
    }

    pub fn transport(self) -> TransportKind {
        match self {
            TargetKind::Server => TransportKind::Stream,
            TargetKind::Recursor => TransportKind::Datagram,
        }
    }

    pub fn default_command(self) -> &'static str {
        match self {
            TargetKind::Server => SERVER_COMMAND,
            TargetKind::Recursor => RECURSOR_COMMAND,
        }
    }

    pub fn default_socket(self) -> &'static str {
        match self {
            TargetKind::Server => SERVER_SOCKET,
            TargetKind::Recursor => RECURSOR_SOCKET,
        }
    }
}

/// Per-target counters of one collection cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TargetStats {
    /// Bytes in the reply.
    pub reply_bytes: usize,
    /// Statistics found in the reply.
    pub parsed: usize,
    pub dispatched: usize,
    /// Statistics not in the lookup table.
    pub unresolved: usize,
    /// Statistics dropped because of a conversion or schema error.
    pub dropped: usize,
}

/// One configured server or recursor to poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionTarget {
    kind: TargetKind,
    instance: String,
    command: String,
    socket: PathBuf,
}

impl CollectionTarget {
    /// Creates a target with the default command and socket for `kind`.
    pub fn new(kind: TargetKind, instance: impl Into<String>) -> Self {
        Self {
            kind,
            instance: instance.into(),
            command: kind.default_command().to_string(),
            socket: PathBuf::from(kind.default_socket()),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_socket(mut self, socket: impl Into<PathBuf>) -> Self {
        self.socket = socket.into();
        self
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn socket(&self) -> &Path {
        &self.socket
    }

    /// Polls the target once and dispatches every recognized statistic.
    ///
    /// Only transport failures are returned; per-statistic problems are
    /// logged and counted in [`TargetStats`].
    pub fn collect<D: Dispatcher + ?Sized>(
        &self,
        local: &LocalSocket,
        timeout: Option<Duration>,
        dispatcher: &mut D,
        host: &str,
    ) -> Result<TargetStats, TransportError> {
        let reply = fetch(
            self.kind.transport(),
            &self.socket,
            &self.command,
            local,
            timeout,
        )?;
        let text = reply.text();

        let stats = match self.kind {
            TargetKind::Server => parse_server_reply(&text),
            TargetKind::Recursor => parse_recursor_reply(&self.command, &text),
        };

        let mut result = TargetStats {
            reply_bytes: reply.len(),
            parsed: stats.len(),
            ..TargetStats::default()
        };
        for RawStat { name, value } in stats {
            match submit(dispatcher, host, &self.instance, name, value) {
                Ok(Submission::Dispatched) => result.dispatched += 1,
                Ok(Submission::Unresolved) => result.unresolved += 1,
                Err(e) => {
                    error!("{} {}: {}", self.kind.name(), self.instance, e);
                    result.dropped += 1;
                }
            }
        }

        debug!(
            "{} {}: {} bytes, {} parsed, {} dispatched, {} unresolved, {} dropped",
            self.kind.name(),
            self.instance,
            result.reply_bytes,
            result.parsed,
            result.dispatched,
            result.unresolved,
            result.dropped
        );
        Ok(result)
    }
}
