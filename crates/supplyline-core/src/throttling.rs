use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Client-side request budget for one connector, e.g. "at most 5 requests per second".
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
    window: Duration,
    limit: u32,
}

impl RequestThrottle {
    /// Allow `limit` requests per `window`, bursting up to `limit`.
    pub fn new(window: Duration, limit: u32) -> Self {
        let limit = NonZeroU32::new(limit).unwrap_or(NonZeroU32::MIN);
        let period = (window / limit.get()).max(Duration::from_millis(1));
        let quota = Quota::with_period(period)
            .unwrap_or_else(|| Quota::per_second(limit))
            .allow_burst(limit);

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            window,
            limit: limit.get(),
        }
    }

    pub fn per_second(limit: u32) -> Self {
        Self::new(Duration::from_secs(1), limit)
    }

    /// Wait until the budget admits one more request.
    pub async fn ready(&self) {
        self.limiter.until_ready().await;
    }

    /// Non-blocking check; consumes budget when it returns `true`.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    pub const fn limit(&self) -> u32 {
        self.limit
    }
}

impl std::fmt::Debug for RequestThrottle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestThrottle")
            .field("window", &self.window)
            .field("limit", &self.limit)
            .finish()
    }
}
