//! Ordered set of configured targets and the full collection cycle.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::collector::target::CollectionTarget;
use crate::collector::transport::LocalSocket;
use crate::dispatch::Dispatcher;

/// Default transport timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Summary of one collection cycle over all targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub targets_ok: usize,
    pub targets_failed: usize,
    pub dispatched: usize,
    /// Statistics dropped because of conversion or schema errors.
    pub dropped: usize,
    pub elapsed: Duration,
}

/// Holds every configured target plus the state they share.
#[derive(Debug)]
pub struct Registry {
    local_socket: LocalSocket,
    timeout: Option<Duration>,
    targets: Vec<CollectionTarget>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(LocalSocket::default())
    }
}

impl Registry {
    pub fn new(local_socket: LocalSocket) -> Self {
        Self {
            local_socket,
            timeout: Some(DEFAULT_TIMEOUT),
            targets: Vec::new(),
        }
    }

    /// Sets the transport timeout. `None` or zero blocks indefinitely.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout.filter(|t| !t.is_zero());
    }

    pub fn set_local_socket(&mut self, local_socket: LocalSocket) {
        self.local_socket = local_socket;
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn local_socket(&self) -> &LocalSocket {
        &self.local_socket
    }

    /// Appends a target; targets are polled in insertion order.
    pub fn add(&mut self, target: CollectionTarget) {
        debug!(
            "add {}: instance = {}",
            target.kind().name(),
            target.instance()
        );
        self.targets.push(target);
    }

    pub fn for_each<F: FnMut(&CollectionTarget)>(&self, visit: F) {
        self.targets.iter().for_each(visit);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CollectionTarget> {
        self.targets.iter()
    }

    /// Drops every target.
    pub fn clear(&mut self) {
        self.targets.clear();
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Polls every target once. A failing target is logged and skipped.
    pub fn read_all<D: Dispatcher + ?Sized>(
        &self,
        dispatcher: &mut D,
        host: &str,
    ) -> CycleReport {
        let start = Instant::now();
        let mut report = CycleReport::default();

        self.for_each(|target| {
            match target.collect(&self.local_socket, self.timeout, &mut *dispatcher, host) {
                Ok(stats) => {
                    report.targets_ok += 1;
                    report.dispatched += stats.dispatched;
                    report.dropped += stats.dropped;
                }
                Err(e) => {
                    warn!(
                        "{} {} ({}): {}",
                        target.kind().name(),
                        target.instance(),
                        target.socket().display(),
                        e
                    );
                    report.targets_failed += 1;
                }
            }
        });

        report.elapsed = start.elapsed();
        report
    }
}
