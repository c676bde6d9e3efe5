//! pdnsstatd - PowerDNS statistics collector daemon.
//!
//! Polls the configured PowerDNS servers and recursors at a fixed interval
//! and writes every recognized statistic to stdout.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pdnsstat::collector::{CycleReport, Registry};
use pdnsstat::config;
use pdnsstat::dispatch::{OutputFormat, TypesDb, WriterDispatcher};

/// Output line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    /// One JSON object per line.
    Json,
    /// collectd `PUTVAL` lines.
    Putval,
}

impl From<Format> for OutputFormat {
    fn from(f: Format) -> Self {
        match f {
            Format::Json => OutputFormat::Json,
            Format::Putval => OutputFormat::Putval,
        }
    }
}

/// PowerDNS statistics collector daemon.
#[derive(Parser)]
#[command(name = "pdnsstatd", about = "PowerDNS statistics collector daemon", version)]
struct Args {
    /// Path to the JSON configuration file.
    #[arg(short, long, default_value = "/etc/pdnsstat.json")]
    config: PathBuf,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Additional types.db file; its entries override the built-in types.
    #[arg(long, value_name = "PATH")]
    types_db: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value = "json")]
    format: Format,

    /// Host name stamped on every observation.
    #[arg(long, env = "HOSTNAME")]
    hostname: Option<String>,

    /// Run a single collection cycle and exit.
    #[arg(long)]
    once: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber on stderr; stdout carries the metrics.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("pdnsstatd={}", level).parse().unwrap())
        .add_directive(format!("pdnsstat={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

/// Kernel host name, falling back to "localhost".
fn default_hostname() -> String {
    std::fs::read_to_string("/proc/sys/kernel/hostname")
        .map(|h| h.trim().to_string())
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Describes a cycle report for logging.
fn describe_report(report: &CycleReport) -> String {
    let mut parts = vec![
        format!("{} targets ok", report.targets_ok),
        format!("{} values", report.dispatched),
    ];
    if report.targets_failed > 0 {
        parts.push(format!("{} targets failed", report.targets_failed));
    }
    if report.dropped > 0 {
        parts.push(format!("{} values dropped", report.dropped));
    }
    parts.push(format!("{} ms", report.elapsed.as_millis()));
    parts.join(", ")
}

fn load_types(path: Option<&Path>) -> Result<TypesDb, String> {
    let mut types = TypesDb::builtin();
    if let Some(path) = path {
        let extra = TypesDb::load(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        info!("Loaded {} types from {}", extra.len(), path.display());
        types.merge(extra);
    }
    Ok(types)
}

fn load_registry(path: &Path) -> Result<Registry, String> {
    let items = config::load_file(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(config::build_registry(&items))
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("pdnsstatd {} starting", env!("CARGO_PKG_VERSION"));

    let types = match load_types(args.types_db.as_deref()) {
        Ok(t) => t,
        Err(e) => {
            error!("Failed to load types: {}", e);
            std::process::exit(1);
        }
    };

    let mut registry = match load_registry(&args.config) {
        Ok(r) => r,
        Err(e) => {
            error!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };
    if registry.is_empty() {
        warn!("No Server or Recursor configured, nothing to collect");
    }

    let hostname = args.hostname.clone().unwrap_or_else(default_hostname);
    let interval = Duration::from_secs(args.interval.max(1));
    info!(
        "Config: interval={}s, host={}, targets={}, local_socket={}",
        interval.as_secs(),
        hostname,
        registry.len(),
        registry.local_socket().path().display()
    );
    registry.for_each(|t| {
        debug!(
            "Target {} {}: socket={}, command={}",
            t.kind().name(),
            t.instance(),
            t.socket().display(),
            t.command()
        );
    });

    let mut dispatcher = WriterDispatcher::new(types, io::stdout(), args.format.into())
        .with_interval(interval);

    if args.once {
        let report = registry.read_all(&mut dispatcher, &hostname);
        info!("Cycle: {}", describe_report(&report));
        registry.clear();
        return;
    }

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    info!("Starting collection loop");

    let mut cycle_count: u64 = 0;
    while running.load(Ordering::SeqCst) {
        let report = registry.read_all(&mut dispatcher, &hostname);
        cycle_count += 1;

        if report.targets_failed > 0 {
            warn!("Cycle #{}: {}", cycle_count, describe_report(&report));
        } else {
            debug!("Cycle #{}: {}", cycle_count, describe_report(&report));
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval.saturating_sub(report.elapsed);
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down after {} cycles...", cycle_count);
    registry.clear();
    info!("Shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_report_lists_failures() {
        let report = CycleReport {
            targets_ok: 1,
            targets_failed: 2,
            dispatched: 30,
            dropped: 3,
            elapsed: Duration::from_millis(12),
        };
        assert_eq!(
            describe_report(&report),
            "1 targets ok, 30 values, 2 targets failed, 3 values dropped, 12 ms"
        );
    }

    #[test]
    fn describe_report_omits_zero_failures() {
        let report = CycleReport {
            targets_ok: 2,
            dispatched: 5,
            ..CycleReport::default()
        };
        assert_eq!(describe_report(&report), "2 targets ok, 5 values, 0 ms");
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "pdnsstatd",
            "--config",
            "/tmp/p.json",
            "--format",
            "putval",
            "--hostname",
            "ns1",
            "--once",
            "-vv",
        ])
        .unwrap();
        assert_eq!(args.config, PathBuf::from("/tmp/p.json"));
        assert_eq!(args.format, Format::Putval);
        assert_eq!(args.hostname.as_deref(), Some("ns1"));
        assert!(args.once);
        assert_eq!(args.verbose, 2);
        assert_eq!(args.interval, 10);
    }
}
