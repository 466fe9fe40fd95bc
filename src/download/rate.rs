// src/download/rate.rs
// =============================================================================
// --rate-limit support: parse "400k" / "2M" / "1000" and throttle a stream
// of chunks so the average speed stays at or below the limit.
// =============================================================================

use std::time::{Duration, Instant};

use crate::error::{MirrorError, Result};

// Parses a rate limit into bytes per second
//
// Examples:
//   "1000" -> 1000
//   "400k" -> 409600      (k = 1024)
//   "2M"   -> 2097152     (m = 1024 * 1024)
pub fn parse_rate_limit(raw: &str) -> Result<u64> {
    let value = raw.trim().to_ascii_lowercase();
    let (digits, multiplier) = if let Some(rest) = value.strip_suffix('k') {
        (rest, 1024)
    } else if let Some(rest) = value.strip_suffix('m') {
        (rest, 1024 * 1024)
    } else {
        (value.as_str(), 1)
    };

    let rate: u64 = digits
        .trim()
        .parse()
        .map_err(|_| MirrorError::InvalidRate(raw.to_string()))?;
    if rate == 0 {
        return Err(MirrorError::InvalidRate(raw.to_string()));
    }

    rate.checked_mul(multiplier)
        .ok_or_else(|| MirrorError::InvalidRate(raw.to_string()))
}

/// Sleeps just enough to keep a byte stream under `bytes_per_sec`.
#[derive(Debug)]
pub struct RateLimiter {
    bytes_per_sec: u64,
    consumed: u64,
    started: Instant,
}

impl RateLimiter {
    pub fn new(bytes_per_sec: u64) -> Self {
        RateLimiter {
            bytes_per_sec: bytes_per_sec.max(1),
            consumed: 0,
            started: Instant::now(),
        }
    }

    /// Accounts for `bytes` just read and waits if we're ahead of schedule.
    pub async fn throttle(&mut self, bytes: usize) {
        self.consumed += bytes as u64;
        let wait = delay_for(self.consumed, self.bytes_per_sec, self.started.elapsed());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

// How long to wait so that `consumed` bytes took at least consumed / rate
fn delay_for(consumed: u64, bytes_per_sec: u64, elapsed: Duration) -> Duration {
    let expected = Duration::from_secs_f64(consumed as f64 / bytes_per_sec as f64);
    expected.saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_and_suffixed_rates() {
        assert_eq!(parse_rate_limit("1000").unwrap(), 1000);
        assert_eq!(parse_rate_limit("400k").unwrap(), 400 * 1024);
        assert_eq!(parse_rate_limit("400K").unwrap(), 400 * 1024);
        assert_eq!(parse_rate_limit("2M").unwrap(), 2 * 1024 * 1024);
        assert_eq!(parse_rate_limit(" 3m ").unwrap(), 3 * 1024 * 1024);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(parse_rate_limit("fast"), Err(MirrorError::InvalidRate(_))));
        assert!(matches!(parse_rate_limit("k"), Err(MirrorError::InvalidRate(_))));
        assert!(matches!(parse_rate_limit("0"), Err(MirrorError::InvalidRate(_))));
        assert!(matches!(parse_rate_limit("-5k"), Err(MirrorError::InvalidRate(_))));
    }

    #[test]
    fn test_delay_for() {
        // 1000 bytes at 1000 B/s should take a second
        assert_eq!(delay_for(1000, 1000, Duration::ZERO), Duration::from_secs(1));
        assert_eq!(
            delay_for(1000, 1000, Duration::from_millis(400)),
            Duration::from_millis(600)
        );
        // Behind schedule already: no waiting
        assert_eq!(delay_for(1000, 1000, Duration::from_secs(2)), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_throttle_slows_down() {
        let mut limiter = RateLimiter::new(10_000);
        let started = Instant::now();
        limiter.throttle(1_000).await;
        assert!(started.elapsed() >= Duration::from_millis(90));
    }
}
