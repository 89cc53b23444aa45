//! Chunk pacing.
//!
//! Every relay direction charges the time a chunk *should* have taken at the
//! configured rate once per chunk. This is a coarse cap rather than a smooth
//! token bucket: sustained throughput stays at or below the cap, but a single
//! chunk is delivered as one burst.

use std::time::Duration;

/// Time `bytes` should take at `rate_kbps` (1 kbit = 1024 bits).
///
/// `rate_kbps == 0` means unlimited and yields zero. Computed in microseconds
/// so that per-chunk truncation stays below a microsecond.
pub fn delay(bytes: usize, rate_kbps: u32) -> Duration {
    if rate_kbps == 0 || bytes == 0 {
        return Duration::ZERO;
    }
    let bits = bytes as u128 * 8;
    let micros = bits * 1_000_000 / (rate_kbps as u128 * 1024);
    Duration::from_micros(micros.min(u64::MAX as u128) as u64)
}

/// Sleep for [`delay`], skipping the timer entirely when there is nothing to wait.
///
/// Returns the time charged.
pub async fn pace(bytes: usize, rate_kbps: u32) -> Duration {
    let wait = delay(bytes, rate_kbps);
    if !wait.is_zero() {
        tokio::time::sleep(wait).await;
    }
    wait
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_rate_is_unlimited() {
        assert_eq!(delay(8192, 0), Duration::ZERO);
        assert_eq!(delay(0, 500), Duration::ZERO);
    }

    #[test]
    fn matches_millisecond_formula() {
        // 8 KiB at 500 kbps: 8192 * 8 * 1000 / (500 * 1024) = 128 ms
        assert_eq!(delay(8192, 500), Duration::from_millis(128));
        // 64 KiB at 500 kbps ≈ 1.024 s
        assert_eq!(delay(65536, 500), Duration::from_millis(1024));
    }

    #[test]
    fn never_undercharges_relative_to_millis() {
        for (bytes, kbps) in [(1000, 3), (1, 1), (4097, 50_000), (8192, 20)] {
            let millis = (bytes as u64 * 8 * 1000) / (kbps as u64 * 1024);
            assert!(delay(bytes, kbps) >= Duration::from_millis(millis));
        }
    }

    #[tokio::test]
    async fn pace_sleeps_for_the_delay() {
        let start = std::time::Instant::now();
        let charged = pace(8192, 1000).await;
        assert_eq!(charged, Duration::from_millis(64));
        assert!(start.elapsed() >= Duration::from_millis(64));
    }
}
