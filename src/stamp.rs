//! Wall-clock stamps for outbound messages.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Seconds since the Unix epoch plus a nanosecond remainder.
///
/// `sec` is signed so instants before the epoch stay representable;
/// `nanosec` is always normalized into `[0, 1e9)`. Derived ordering is
/// chronological because of that normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub sec: i64,
    pub nanosec: u32,
}

impl Timestamp {
    /// Read the wall clock, backdated by `delta_ms`.
    ///
    /// The delta is how far in the past the sample actually happened
    /// relative to message construction (capture latency). It is always
    /// subtracted, never added.
    pub fn now(delta_ms: u64) -> Self {
        let instant = SystemTime::now() - Duration::from_millis(delta_ms);
        Self::from_system_time(instant)
    }

    fn from_system_time(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Self {
                sec: d.as_secs() as i64,
                nanosec: d.subsec_nanos(),
            },
            // Before the epoch: borrow one second to keep nanosec positive
            Err(e) => {
                let d = e.duration();
                if d.subsec_nanos() == 0 {
                    Self {
                        sec: -(d.as_secs() as i64),
                        nanosec: 0,
                    }
                } else {
                    Self {
                        sec: -(d.as_secs() as i64) - 1,
                        nanosec: NANOS_PER_SEC - d.subsec_nanos(),
                    }
                }
            }
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.sec, self.nanosec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nanosec_stays_normalized() {
        for delta in [0, 1, 999, 1000, 86_400_000] {
            let t = Timestamp::now(delta);
            assert!(t.nanosec < NANOS_PER_SEC);
        }
    }

    #[test]
    fn backdated_stamp_precedes_current() {
        let backdated = Timestamp::now(5_000);
        let current = Timestamp::now(0);
        assert!(backdated < current);
    }

    #[test]
    fn delta_is_subtracted() {
        let a = Timestamp::now(2_000);
        let b = Timestamp::now(0);
        let diff_ns =
            (b.sec - a.sec) * 1_000_000_000 + (b.nanosec as i64 - a.nanosec as i64);
        // ~2s apart, with slack for the two clock reads
        assert!((1_900_000_000..2_100_000_000).contains(&diff_ns), "{diff_ns}");
    }

    #[test]
    fn pre_epoch_instants_normalize() {
        let t = Timestamp::from_system_time(UNIX_EPOCH - Duration::from_millis(1_500));
        assert_eq!(t.sec, -2);
        assert_eq!(t.nanosec, 500_000_000);

        let exact = Timestamp::from_system_time(UNIX_EPOCH - Duration::from_secs(3));
        assert_eq!(exact.sec, -3);
        assert_eq!(exact.nanosec, 0);
    }
}
