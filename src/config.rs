use std::time::Duration;

use clap::ValueEnum;

use crate::error::ConfigError;

/// Connect deadline for a single attempt.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);
/// Probes allowed in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 512;
/// Upper bound accepted for `concurrency`.
pub const MAX_CONCURRENCY: usize = 5_000;
/// Extra attempts granted to a refused port before it is declared closed.
pub const DEFAULT_REFUSED_RETRIES: u32 = 1;
/// Pause between attempts when a probe is retried.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);
/// Cap on retries caused by transient local conditions (fd exhaustion, busy device).
pub const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 100;

/// How a connect that hits its deadline is interpreted.
///
/// A timeout can mean a filtering firewall (the port is effectively closed) or
/// a congested path (worth trying again). Neither reading is universally right,
/// so the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TimeoutPolicy {
    /// Treat a timeout as transient and retry, bounded by the transient cap.
    Retry,
    /// Treat a timeout like a refusal: a few extra attempts, then closed.
    #[default]
    Closed,
}

/// Per-port probing knobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeConfig {
    pub timeout: Duration,
    pub refused_retries: u32,
    pub retry_backoff: Duration,
    pub max_transient_retries: u32,
    pub timeout_policy: TimeoutPolicy,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            refused_retries: DEFAULT_REFUSED_RETRIES,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
            timeout_policy: TimeoutPolicy::default(),
        }
    }
}

/// Whole-scan configuration: the concurrency budget plus the probe settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub concurrency: usize,
    pub probe: ProbeConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            probe: ProbeConfig::default(),
        }
    }
}

impl ScanConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_concurrency(self.concurrency)?;
        if self.probe.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

pub(crate) fn validate_concurrency(concurrency: usize) -> Result<(), ConfigError> {
    match concurrency {
        0 => Err(ConfigError::ZeroConcurrency),
        n if n > MAX_CONCURRENCY => Err(ConfigError::ConcurrencyTooHigh(n)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ScanConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.concurrency, 512);
        assert_eq!(cfg.probe.timeout, Duration::from_millis(500));
        assert_eq!(cfg.probe.timeout_policy, TimeoutPolicy::Closed);
    }

    #[test]
    fn rejects_bad_budget_and_timeout() {
        let mut cfg = ScanConfig::default();
        cfg.concurrency = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroConcurrency));

        cfg.concurrency = MAX_CONCURRENCY + 1;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ConcurrencyTooHigh(MAX_CONCURRENCY + 1))
        );

        cfg.concurrency = 1;
        cfg.probe.timeout = Duration::ZERO;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTimeout));
    }
}
