use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, warn};

use crate::classify::{classify_io_error, ErrorClass};
use crate::config::ProbeConfig;

/// Result of a single connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    Open,
    Closed,
    RetryableError,
    FatalError,
}

/// Opens and closes connections. The seam between the retry policy and the network.
pub trait Connector: Send + Sync + 'static {
    type Stream: Send;

    /// Connect to `host:port`, giving up after `timeout`.
    ///
    /// Hitting the deadline must surface as [`io::ErrorKind::TimedOut`].
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = io::Result<Self::Stream>> + Send;

    fn close(&self, stream: Self::Stream) -> impl Future<Output = io::Result<()>> + Send;
}

/// Backoff clock. Swapped out in tests so retries cost no wall time.
pub trait Sleeper: Send + Sync + 'static {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Anything that can answer "is this port open?". The coordinator only needs this.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, host: &str, port: u16) -> impl Future<Output = bool> + Send;
}

/// Plain TCP connect using tokio. Resolves `host` on every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
        connect_within(timeout, TcpStream::connect((host, port))).await
    }

    async fn close(&self, mut stream: TcpStream) -> io::Result<()> {
        stream.shutdown().await
    }
}

/// Bound `connect` by `timeout`; an elapsed deadline reads as an "i/o timeout" `TimedOut` error.
async fn connect_within<T, F>(timeout: Duration, connect: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match time::timeout(timeout, connect).await {
        Ok(res) => res,
        Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "i/o timeout")),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        time::sleep(duration).await
    }
}

/// Detailed verdict for one port, including how many attempts it took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReport {
    pub open: bool,
    pub attempts: u32,
    /// Class of the last failed attempt, if any.
    pub last_class: Option<ErrorClass>,
}

/// Connect-based port probe with the retry policy from [`ProbeConfig`].
#[derive(Debug, Clone)]
pub struct Prober<C = TcpConnector, S = TokioSleeper> {
    connector: C,
    sleeper: S,
    config: ProbeConfig,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Self::with_parts(config, TcpConnector, TokioSleeper)
    }
}

impl<C: Connector, S: Sleeper> Prober<C, S> {
    pub fn with_parts(config: ProbeConfig, connector: C, sleeper: S) -> Self {
        Self {
            connector,
            sleeper,
            config,
        }
    }

    /// Probe `host:port` until it is open or the retry policy gives up.
    ///
    /// - refused ports, and timeouts under [`TimeoutPolicy::Closed`], get
    ///   `refused_retries` extra attempts
    /// - transient resource errors retry up to `max_transient_retries` times
    /// - anything else is final on first sight
    ///
    /// [`TimeoutPolicy::Closed`]: crate::config::TimeoutPolicy::Closed
    pub async fn probe_detailed(&self, host: &str, port: u16) -> ProbeReport {
        let cfg = &self.config;
        let mut refused = 0u32;
        let mut transient = 0u32;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            let (outcome, class) = self.attempt(host, port).await;

            let retry = match outcome {
                ProbeOutcome::Open => {
                    return ProbeReport {
                        open: true,
                        attempts,
                        last_class: None,
                    };
                }
                ProbeOutcome::RetryableError if transient < cfg.max_transient_retries => {
                    transient += 1;
                    true
                }
                ProbeOutcome::Closed if refused < cfg.refused_retries => {
                    refused += 1;
                    true
                }
                _ => false,
            };

            if !retry {
                if outcome == ProbeOutcome::RetryableError {
                    debug!(port, attempts, "transient retries exhausted, reporting closed");
                }
                return ProbeReport {
                    open: false,
                    attempts,
                    last_class: class,
                };
            }
            self.sleeper.sleep(cfg.retry_backoff).await;
        }
    }

    /// One connect attempt. A successful connection is closed before returning.
    async fn attempt(&self, host: &str, port: u16) -> (ProbeOutcome, Option<ErrorClass>) {
        match self.connector.connect(host, port, self.config.timeout).await {
            Ok(stream) => {
                if let Err(e) = self.connector.close(stream).await {
                    warn!(port, error = %e, "error on closing connection");
                }
                (ProbeOutcome::Open, None)
            }
            Err(e) => {
                let class = classify_io_error(&e, self.config.timeout_policy);
                debug!(port, error = %e, ?class, "connect failed");
                (class.outcome(), Some(class))
            }
        }
    }
}

impl<C: Connector, S: Sleeper> Probe for Prober<C, S> {
    async fn probe(&self, host: &str, port: u16) -> bool {
        self.probe_detailed(host, port).await.open
    }
}
