//! Pause between consecutive failed requests.

use std::time::Duration;

/// Backoff strategy applied after a timeout or transient server error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Same delay after every failure. A zero delay disables pausing.
    Fixed { delay: Duration },
    /// `base * factor ^ attempt`, capped at `max`, optionally jittered by +/- 50%.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl Backoff {
    pub const fn none() -> Self {
        Self::Fixed {
            delay: Duration::ZERO,
        }
    }

    /// Delay before the next request, `attempt` being the 0-based count of prior
    /// consecutive failures.
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped = if seconds.is_finite() {
                    seconds.min(max.as_secs_f64())
                } else {
                    max.as_secs_f64()
                };
                let delay = Duration::from_secs_f64(capped.max(0.0));

                if !jitter {
                    return delay;
                }
                let half = u64::try_from(delay.as_millis() / 2).unwrap_or(u64::MAX / 4);
                let offset = fastrand::u64(0..=half.saturating_mul(2));
                let millis = u64::try_from(delay.as_millis())
                    .unwrap_or(u64::MAX / 2)
                    .saturating_sub(half)
                    .saturating_add(offset);
                Duration::from_millis(millis)
            }
        }
    }

    pub async fn wait(self, attempt: u32) {
        let delay = self.delay(attempt);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_backoff_ignores_attempt() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
        assert_eq!(Backoff::none().delay(3), Duration::ZERO);
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: false,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn jitter_stays_within_half_of_the_delay() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: true,
        };

        for _ in 0..10 {
            for attempt in 0..5 {
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                assert!(delay_ms >= expected * 0.49, "attempt={attempt}, delay_ms={delay_ms}");
                assert!(delay_ms <= expected * 1.51, "attempt={attempt}, delay_ms={delay_ms}");
            }
        }
    }

    #[tokio::test]
    async fn zero_delay_returns_immediately() {
        let started = std::time::Instant::now();
        Backoff::none().wait(5).await;
        assert!(started.elapsed() < Duration::from_millis(50));
    }
}
