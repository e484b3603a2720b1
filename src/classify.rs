use std::io;

use crate::config::TimeoutPolicy;
use crate::probe::ProbeOutcome;

/// What a failed connect attempt tells us about the port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient local condition; back off and try again.
    Retry,
    /// Port refused the connection; closed after the bounded extra retries.
    Refused,
    /// Target address is not valid in this context.
    InvalidAddr,
    /// Local side cannot use the address, usually a disabled protocol family.
    AddrUnassignable,
    /// Anything not recognised. Closed, no retry.
    Unhandled,
}

impl ErrorClass {
    pub fn outcome(self) -> ProbeOutcome {
        match self {
            ErrorClass::Retry => ProbeOutcome::RetryableError,
            ErrorClass::Refused => ProbeOutcome::Closed,
            ErrorClass::InvalidAddr | ErrorClass::AddrUnassignable | ErrorClass::Unhandled => {
                ProbeOutcome::FatalError
            }
        }
    }
}

impl TimeoutPolicy {
    fn class(self) -> ErrorClass {
        match self {
            TimeoutPolicy::Retry => ErrorClass::Retry,
            TimeoutPolicy::Closed => ErrorClass::Refused,
        }
    }
}

/// Classify a connect error, preferring the structured error kind and OS code
/// and falling back to the message text.
pub fn classify_io_error(err: &io::Error, policy: TimeoutPolicy) -> ErrorClass {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => return ErrorClass::Refused,
        io::ErrorKind::TimedOut => return policy.class(),
        // Windows reports "not valid in its context" under the same kind.
        io::ErrorKind::AddrNotAvailable => {
            return match classify_message(&err.to_string(), policy) {
                ErrorClass::InvalidAddr => ErrorClass::InvalidAddr,
                _ => ErrorClass::AddrUnassignable,
            }
        }
        _ => {}
    }

    #[cfg(unix)]
    if let Some(libc::EMFILE | libc::ENFILE | libc::EBUSY) = err.raw_os_error() {
        return ErrorClass::Retry;
    }

    classify_message(&err.to_string(), policy)
}

/// Match an error message against the taxonomy. First match wins.
pub fn classify_message(msg: &str, policy: TimeoutPolicy) -> ErrorClass {
    let msg = msg.to_ascii_lowercase();
    let has = |needle: &str| msg.contains(needle);

    if has("connection refused") {
        ErrorClass::Refused
    } else if has("i/o timeout") {
        policy.class()
    } else if has("requested address is not valid") {
        ErrorClass::InvalidAddr
    } else if has("can't assign requested address") || has("cannot assign requested address") {
        ErrorClass::AddrUnassignable
    } else if has("device or resource busy") || has("too many open files") {
        ErrorClass::Retry
    } else {
        ErrorClass::Unhandled
    }
}
