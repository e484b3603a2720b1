//! Library crate for portsweep: a full-range TCP connect scanner for one host.
//!
//! The engine is two pieces. [`probe::Prober`] makes one connection attempt per
//! call, classifies failures and applies the retry policy. [`scanner::Scanner`]
//! dispatches one probe per port under a fixed concurrency budget and funnels
//! open ports through a single collector task into a sorted list.
pub mod classify;
pub mod config;
pub mod error;
pub mod ports;
pub mod probe;
pub mod scanner;

pub use config::{ProbeConfig, ScanConfig, TimeoutPolicy};
pub use error::ConfigError;
pub use ports::PortRange;
pub use scanner::{scan, Scanner};
