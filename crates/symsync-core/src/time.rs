//! Sync timestamps
//!
//! Every accepted write carries a `SyncTime`: microseconds since the Unix
//! epoch as seen by the writer's wall clock. Actors are only loosely
//! synchronized, so ordering between actors is "last writer wins" under
//! whatever drift exists; there is no global total order.

use std::fmt;
use std::ops::{Add, Sub};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Logical timestamp of a property write
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncTime(pub i64);

impl SyncTime {
    pub const ZERO: SyncTime = SyncTime(0);
    pub const MAX: SyncTime = SyncTime(i64::MAX);

    /// Current wall clock time
    pub fn now() -> Self {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(d) => SyncTime(d.as_micros().min(i64::MAX as u128) as i64),
            // Clock set before 1970: treat as the oldest possible write
            Err(_) => SyncTime::ZERO,
        }
    }

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        SyncTime(micros)
    }

    #[inline]
    pub fn from_millis(millis: i64) -> Self {
        SyncTime(millis.saturating_mul(1000))
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_millis(self) -> i64 {
        self.0 / 1000
    }

    #[inline]
    pub fn saturating_sub(self, other: SyncTime) -> Duration {
        if self.0 > other.0 {
            Duration::from_micros((self.0 - other.0) as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl Add<Duration> for SyncTime {
    type Output = SyncTime;

    fn add(self, rhs: Duration) -> Self::Output {
        SyncTime(self.0.saturating_add(rhs.as_micros() as i64))
    }
}

impl Sub<Duration> for SyncTime {
    type Output = SyncTime;

    fn sub(self, rhs: Duration) -> Self::Output {
        SyncTime(self.0.saturating_sub(rhs.as_micros() as i64))
    }
}

impl fmt::Debug for SyncTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "τ({})", self.0)
    }
}

impl fmt::Display for SyncTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_time_arithmetic() {
        let t = SyncTime::from_millis(10);
        assert_eq!((t + Duration::from_millis(5)).as_millis(), 15);
        assert_eq!((t - Duration::from_millis(5)).as_millis(), 5);
        assert_eq!(t.saturating_sub(SyncTime::from_millis(4)), Duration::from_millis(6));
        assert_eq!(SyncTime::ZERO.saturating_sub(t), Duration::ZERO);
    }

    #[test]
    fn test_sync_time_now_is_after_epoch() {
        assert!(SyncTime::now() > SyncTime::ZERO);
    }

    #[test]
    fn test_sync_time_saturates() {
        assert_eq!(SyncTime::MAX + Duration::from_secs(1), SyncTime::MAX);
    }
}
