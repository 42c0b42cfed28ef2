//! Clock helpers shared across the cache and checkpoint layers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Convert a filesystem modification timestamp to epoch milliseconds.
///
/// Returns `None` for timestamps before the epoch (seen on some exotic
/// filesystems) rather than guessing.
pub fn system_time_ms(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn now_is_after_2020() {
        // 2020-01-01 in epoch millis
        assert!(now_ms() > 1_577_836_800_000);
    }

    #[test]
    fn converts_known_system_time() {
        let t = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
        assert_eq!(system_time_ms(t), Some(1_700_000_000_123));
    }

    #[test]
    fn pre_epoch_time_is_none() {
        let t = UNIX_EPOCH - Duration::from_secs(1);
        assert_eq!(system_time_ms(t), None);
    }
}
