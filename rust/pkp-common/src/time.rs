//! Cross-platform time utilities.
//!
//! Session credentials and sign-in messages carry expirations as whole
//! seconds since the unix epoch, so the helpers here work in that unit.

pub use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Returns the current system time.
///
/// Uses `std::time::SystemTime::now()` on native and `web_time::SystemTime::now().to_std()`
/// on WASM.
#[cfg(not(target_arch = "wasm32"))]
pub fn now() -> SystemTime {
    SystemTime::now()
}

/// Returns the current system time.
///
/// Uses `std::time::SystemTime::now()` on native and `web_time::SystemTime::now().to_std()`
/// on WASM.
#[cfg(target_arch = "wasm32")]
pub fn now() -> SystemTime {
    use web_time::web::SystemTimeExt;
    web_time::SystemTime::now().to_std()
}

/// Whole seconds between the unix epoch and `time`. Times before the epoch
/// collapse to zero.
pub fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

/// Latest instant [`from_unix_seconds`] yields: 9999-12-31T23:59:59Z.
/// Every supported platform can represent it.
pub const MAX_UNIX_SECONDS: u64 = 253_402_300_799;

/// Inverse of [`unix_seconds`]. Values past [`MAX_UNIX_SECONDS`] clamp to
/// it rather than overflowing.
pub fn from_unix_seconds(seconds: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds.min(MAX_UNIX_SECONDS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_returns_reasonable_timestamp() {
        // 2020-01-01T00:00:00Z
        assert!(unix_seconds(now()) > 1_577_836_800);
    }

    #[test]
    fn it_round_trips_whole_seconds() {
        let time = from_unix_seconds(1_700_000_000);
        assert_eq!(unix_seconds(time), 1_700_000_000);
    }

    #[test]
    fn it_clamps_far_future_seconds() {
        let time = from_unix_seconds(u64::MAX);
        assert_eq!(unix_seconds(time), MAX_UNIX_SECONDS);
        assert!(time > now());
    }

    #[test]
    fn it_clamps_pre_epoch_times() {
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(unix_seconds(before), 0);
    }
}
