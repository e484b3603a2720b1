use std::io::{self, BufWriter, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use portsweep::config::{
    ProbeConfig, ScanConfig, TimeoutPolicy, DEFAULT_CONCURRENCY, DEFAULT_MAX_TRANSIENT_RETRIES,
    DEFAULT_REFUSED_RETRIES,
};
use portsweep::ports::parse_range_str;
use portsweep::Scanner;

const AFTER_HELP: &str = "\
Open ports are found by connecting to them. If you need anything more
stealthy, this is not the right tool for you. Only scan hosts you are
allowed to scan.";

/// portsweep: checks every TCP port on one host and prints the ones it could connect to.
#[derive(Debug, Clone, Parser)]
#[command(name = "portsweep", version, long_about = None, after_help = AFTER_HELP)]
struct Cli {
    /// Target IP address or hostname.
    target: String,

    /// Ports to scan: `N`, `A-B`, `A-` or `-B` (inclusive).
    #[arg(long, short, default_value = "1-65535", allow_hyphen_values = true)]
    ports: String,

    /// Max concurrent TCP connect attempts.
    #[arg(long, short, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Socket connect timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 500)]
    timeout_ms: u64,

    /// Extra attempts for a refused port before it counts as closed.
    #[arg(long = "refused-retries", default_value_t = DEFAULT_REFUSED_RETRIES)]
    refused_retries: u32,

    /// Pause between retries in milliseconds.
    #[arg(long = "backoff-ms", default_value_t = 500)]
    backoff_ms: u64,

    /// Cap on retries for transient local errors (fd exhaustion, busy device).
    #[arg(long = "max-retries", default_value_t = DEFAULT_MAX_TRANSIENT_RETRIES)]
    max_retries: u32,

    /// How to read a connect timeout.
    #[arg(long = "timeout-policy", value_enum, default_value_t = TimeoutPolicy::Closed)]
    timeout_policy: TimeoutPolicy,

    /// Log probe decisions to stderr (repeat for more).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            concurrency: self.concurrency,
            probe: ProbeConfig {
                timeout: Duration::from_millis(self.timeout_ms),
                refused_retries: self.refused_retries,
                retry_backoff: Duration::from_millis(self.backoff_ms),
                max_transient_retries: self.max_retries,
                timeout_policy: self.timeout_policy,
            },
        }
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "portsweep=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let range = parse_range_str(&cli.ports).context("invalid --ports")?;
    let config = cli.scan_config();
    let scanner = Scanner::new(cli.target.as_str(), &config).context("invalid scan settings")?;

    // Ctrl-C stops dispatching; whatever was found so far is still printed.
    let cancel = CancellationToken::new();
    let cancel_ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_ctrlc.cancel();
        }
    });

    let open = scanner.scan_with_cancel(range, cancel).await;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for port in open {
        writeln!(out, "{port}")?;
    }
    out.flush()?;
    Ok(())
}
