//! Time utilities.
//!
//! [`Timestamp`] is the unit of `exp` and `nbf` in a delegation, and
//! [`TimeRange`] is the window in which a delegation (or a whole chain of
//! them) is valid.

pub mod range;

pub use range::*;

use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use web_time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The current time, truncated to whole seconds.
    ///
    /// A clock set before the epoch reads as the epoch.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(since_epoch.as_secs())
    }

    /// A timestamp from seconds since the Unix epoch.
    pub const fn from_unix(seconds: u64) -> Self {
        Timestamp(seconds)
    }

    /// Seconds since the Unix epoch.
    pub const fn to_unix(self) -> u64 {
        self.0
    }

    /// This timestamp moved forward by `duration`, saturating.
    #[must_use]
    pub fn after(self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_add(duration.as_secs()))
    }

    /// This timestamp moved back by `duration`, saturating at the epoch.
    #[must_use]
    pub fn before(self, duration: Duration) -> Self {
        Timestamp(self.0.saturating_sub(duration.as_secs()))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(seconds: u64) -> Self {
        Timestamp(seconds)
    }
}
