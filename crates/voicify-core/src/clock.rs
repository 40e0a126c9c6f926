//! Process-local monotonic clock.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Milliseconds since the first call in this process. Monotonic and never
/// negative, so it can stand in for a platform uptime clock when stamping
/// synthesized input.
pub fn uptime_millis() -> i64 {
    let epoch = EPOCH.get_or_init(Instant::now);
    i64::try_from(epoch.elapsed().as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_is_monotonic() {
        let first = uptime_millis();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = uptime_millis();
        assert!(first >= 0);
        assert!(second >= first + 5);
    }
}
