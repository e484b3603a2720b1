use thiserror::Error;

/// Reasons a scan refuses to start.
///
/// Once a scan is running nothing is fatal; these only come out of construction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("target host must not be empty")]
    EmptyHost,
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("concurrency {0} exceeds the maximum of {max}", max = crate::config::MAX_CONCURRENCY)]
    ConcurrencyTooHigh(usize),
    #[error("probe timeout must be greater than zero")]
    ZeroTimeout,
    #[error("invalid port range {start}..{end} (expected 1 <= start < end <= 65536)")]
    InvalidRange { start: u32, end: u32 },
}
