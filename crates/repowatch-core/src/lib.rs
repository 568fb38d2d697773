use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

pub mod wire;

pub const MAX_INTERVAL_SECS: u16 = 999;

/// The interval pattern the watcher service accepts: 1 to 3 decimal
/// digits, so any value in 0..=999 seconds.
fn interval_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new("^[0-9]{1,3}$").expect("valid interval pattern"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("interval must be 1-3 decimal digits (0-999 seconds)")]
pub struct InvalidInterval;

/// A validated polling interval in seconds, 0..=999.
///
/// Construction goes through `FromStr` (user input) or `TryFrom`
/// (programmatic values); both enforce the range, so a `WatchInterval`
/// held anywhere in the client is always wire-legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct WatchInterval(u16);

impl WatchInterval {
    pub fn seconds(self) -> u16 {
        self.0
    }
}

impl fmt::Display for WatchInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u16> for WatchInterval {
    type Error = InvalidInterval;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value > MAX_INTERVAL_SECS {
            return Err(InvalidInterval);
        }
        Ok(Self(value))
    }
}

impl From<WatchInterval> for u16 {
    fn from(value: WatchInterval) -> Self {
        value.0
    }
}

impl FromStr for WatchInterval {
    type Err = InvalidInterval;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        if !interval_pattern().is_match(input) {
            return Err(InvalidInterval);
        }
        let seconds = input.parse::<u16>().map_err(|_| InvalidInterval)?;
        Self::try_from(seconds)
    }
}
