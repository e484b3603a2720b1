use anyhow::{bail, Context, Result};

use crate::error::ConfigError;

/// Highest valid TCP port.
pub const MAX_PORT: u16 = u16::MAX;

/// Half-open range of TCP ports, `start..end`.
///
/// `end` is a `u32` so the full range `1..65536` is representable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    start: u16,
    end: u32,
}

impl PortRange {
    pub fn new(start: u32, end: u32) -> Result<Self, ConfigError> {
        if start == 0 || start >= end || end > u32::from(MAX_PORT) + 1 {
            return Err(ConfigError::InvalidRange { start, end });
        }
        Ok(Self {
            start: start as u16,
            end,
        })
    }

    /// Every TCP port, 1 through 65535.
    pub fn full() -> Self {
        Self {
            start: 1,
            end: u32::from(MAX_PORT) + 1,
        }
    }

    pub fn start(&self) -> u16 {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn len(&self) -> usize {
        (self.end - u32::from(self.start)) as usize
    }

    /// Always false; construction rejects empty ranges.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, port: u16) -> bool {
        port >= self.start && u32::from(port) < self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> {
        // end <= 65536, so every yielded value fits in u16
        (u32::from(self.start)..self.end).map(|p| p as u16)
    }
}

impl Default for PortRange {
    fn default() -> Self {
        Self::full()
    }
}

/// Parse a command-line port range.
///
/// Supported forms, all inclusive as written:
/// - single port: `80`
/// - range: `1-1024`
/// - open upper end: `1024-` (through 65535)
/// - open lower end: `-1024` (from 1)
pub fn parse_range_str(s: &str) -> Result<PortRange> {
    let s = s.trim();
    if s.is_empty() {
        bail!("empty port range");
    }

    let (start, end) = match s.split_once('-') {
        Some((a, b)) => {
            let a = a.trim();
            let b = b.trim();
            let start = if a.is_empty() {
                1
            } else {
                parse_port_str(a).with_context(|| format!("invalid start in range: {a}"))?
            };
            let end = if b.is_empty() {
                MAX_PORT
            } else {
                parse_port_str(b).with_context(|| format!("invalid end in range: {b}"))?
            };
            if start > end {
                bail!("invalid range {start}-{end} (start > end)");
            }
            (start, end)
        }
        None => {
            let p = parse_port_str(s).with_context(|| format!("invalid port value: {s}"))?;
            (p, p)
        }
    };

    Ok(PortRange::new(u32::from(start), u32::from(end) + 1)?)
}

fn parse_port_str(s: &str) -> Result<u16> {
    let val: u32 = s.parse::<u32>().map_err(|e| anyhow::anyhow!(e))?;
    if val == 0 || val > u32::from(MAX_PORT) {
        bail!("port out of range: {val}");
    }
    Ok(val as u16)
}
