//! Adaptive retry backoff for failed wanted-item searches
//!
//! Exponential growth per consecutive failure with upward-only jitter,
//! capped at the configured ceiling. Because jitter is applied before the
//! cap, the resulting series is monotonically nondecreasing and settles
//! at exactly the cap.

use std::time::Duration;

/// Maximum jitter as a fraction of the computed delay
const JITTER_PERCENT: u64 = 25;

/// Delay before the next retry after `attempt` consecutive failures.
///
/// `attempt` is 1-based: the first failure gets roughly `base`, doubling
/// thereafter.
pub fn retry_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }

    let exponent = attempt.saturating_sub(1).min(32);
    let base_secs = base.as_secs().max(1);
    let uncapped = base_secs.saturating_mul(1u64 << exponent);

    if uncapped >= cap.as_secs() {
        return cap;
    }

    let max_jitter = uncapped * JITTER_PERCENT / 100;
    let jitter = if max_jitter == 0 {
        0
    } else {
        rand::random_range(0..=max_jitter)
    };

    Duration::from_secs((uncapped + jitter).min(cap.as_secs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(900);
    const CAP: Duration = Duration::from_secs(24 * 3600);

    #[test]
    fn first_attempt_is_near_base() {
        for _ in 0..50 {
            let delay = retry_delay(BASE, CAP, 1);
            assert!(delay >= BASE);
            assert!(delay <= BASE + BASE / 4);
        }
    }

    #[test]
    fn series_is_monotonically_nondecreasing() {
        for _ in 0..20 {
            let mut previous = Duration::ZERO;
            for attempt in 1..=12 {
                let delay = retry_delay(BASE, CAP, attempt);
                assert!(
                    delay >= previous,
                    "attempt {attempt}: {delay:?} < {previous:?}"
                );
                previous = delay;
            }
        }
    }

    #[test]
    fn bounded_by_cap() {
        for attempt in 1..=64 {
            assert!(retry_delay(BASE, CAP, attempt) <= CAP);
        }
        // Deep into the series the cap is hit exactly
        assert_eq!(retry_delay(BASE, CAP, 20), CAP);
    }

    #[test]
    fn zero_base_means_immediate_retry() {
        assert_eq!(retry_delay(Duration::ZERO, CAP, 5), Duration::ZERO);
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        assert_eq!(retry_delay(BASE, CAP, u32::MAX), CAP);
    }
}
