use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{validate_concurrency, ScanConfig};
use crate::error::ConfigError;
use crate::ports::PortRange;
use crate::probe::{Probe, Prober};

/// Scan `range` on `host` with a TCP connect probe and return the open ports, ascending.
///
/// Fails only if the configuration is rejected up front.
pub async fn scan(
    host: &str,
    range: PortRange,
    config: &ScanConfig,
) -> Result<Vec<u16>, ConfigError> {
    let scanner = Scanner::new(host, config)?;
    Ok(scanner.scan(range).await)
}

/// Dispatches one probe per port under a fixed concurrency budget.
///
/// - The budget is a `Semaphore`; each task owns its permit until it finishes.
/// - Open ports travel over an `mpsc` channel to one collector task, the only
///   writer of the result list.
/// - Results are sorted before they are returned, so completion order never leaks out.
///
/// Concurrent scans on the same `Scanner` share its budget.
#[derive(Debug)]
pub struct Scanner<P = Prober> {
    host: Arc<str>,
    probe: Arc<P>,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl Scanner<Prober> {
    pub fn new(host: impl Into<String>, config: &ScanConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Self::with_probe(host, config.concurrency, Prober::new(config.probe.clone()))
    }
}

impl<P: Probe> Scanner<P> {
    pub fn with_probe(
        host: impl Into<String>,
        concurrency: usize,
        probe: P,
    ) -> Result<Self, ConfigError> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        validate_concurrency(concurrency)?;
        Ok(Self {
            host: Arc::from(host.trim()),
            probe: Arc::new(probe),
            permits: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        })
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Budget permits not currently held by a probe.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Probe every port in `range` and return the open ones, ascending.
    pub async fn scan(&self, range: PortRange) -> Vec<u16> {
        self.scan_with_cancel(range, CancellationToken::new()).await
    }

    /// Like [`Scanner::scan`], but stops dispatching new probes once `cancel` fires.
    ///
    /// Probes already running are allowed to finish and their results are kept.
    pub async fn scan_with_cancel(&self, range: PortRange, cancel: CancellationToken) -> Vec<u16> {
        debug!(
            host = %self.host,
            start = range.start(),
            end = range.end(),
            concurrency = self.concurrency,
            "starting scan"
        );

        let (tx, rx) = mpsc::channel::<u16>(self.concurrency);
        let collector = spawn_collector(rx);
        let mut set = JoinSet::new();
        let mut dispatched = 0u64;

        for port in range.iter() {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = self.permits.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    // only happens if the semaphore is closed, which we never do
                    Err(_) => break,
                },
            };

            let probe = self.probe.clone();
            let host = self.host.clone();
            let tx = tx.clone();
            set.spawn(async move {
                let _permit = permit; // released when the task ends, whatever the verdict
                if probe.probe(&host, port).await {
                    // collector outlives every probe task
                    let _ = tx.send(port).await;
                }
            });
            dispatched += 1;

            // reap finished tasks so the set does not grow with the range
            while let Some(res) = set.try_join_next() {
                log_join(res);
            }
        }

        while let Some(res) = set.join_next().await {
            log_join(res);
        }
        drop(tx);

        let mut open = match collector.await {
            Ok(open) => open,
            Err(e) => {
                error!(error = %e, "result collector failed");
                Vec::new()
            }
        };
        open.sort_unstable();
        open.dedup();

        if cancel.is_cancelled() {
            warn!(dispatched, total = range.len(), "scan cancelled before all ports were probed");
        }
        info!(host = %self.host, dispatched, open = open.len(), "scan finished");
        open
    }
}

fn spawn_collector(mut rx: mpsc::Receiver<u16>) -> JoinHandle<Vec<u16>> {
    tokio::spawn(async move {
        let mut open = Vec::new();
        while let Some(port) = rx.recv().await {
            debug!(port, "open");
            open.push(port);
        }
        open
    })
}

fn log_join(res: Result<(), tokio::task::JoinError>) {
    if let Err(e) = res {
        warn!(error = %e, "probe task failed");
    }
}
