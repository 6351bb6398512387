use dashmap::DashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// 對外呼叫（Google Ads / BigQuery）的 QPS 限制
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_sec: refill_per_sec.max(0.001),
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    pub fn try_acquire(&self) -> bool {
        self.try_acquire_or_wait().is_none()
    }

    /// 成功取得回傳 None，否則回傳需等待時間
    fn try_acquire_or_wait(&self) -> Option<Duration> {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.refill(&mut state);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            None
        } else {
            let missing = 1.0 - state.tokens;
            Some(Duration::from_secs_f64(missing / self.refill_per_sec))
        }
    }

    pub async fn acquire(&self) {
        while let Some(wait) = self.try_acquire_or_wait() {
            tracing::debug!("⏳ Rate limit reached, waiting {:?}", wait);
            tokio::time::sleep(wait).await;
        }
    }

    pub fn available(&self) -> f64 {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.refill(&mut state);
        state.tokens
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_secs: u64,
}

/// API 端依 key（使用者 / API key / IP）計數的固定視窗限流
pub struct KeyedRateLimiter {
    requests: DashMap<String, (u32, Instant)>,
    requests_per_window: u32,
    window: Duration,
}

impl KeyedRateLimiter {
    pub fn new(requests_per_window: u32, window: Duration) -> Self {
        Self {
            requests: DashMap::new(),
            requests_per_window,
            window,
        }
    }

    pub fn per_minute(requests: u32) -> Self {
        Self::new(requests, Duration::from_secs(60))
    }

    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut entry = self.requests.entry(key.to_string()).or_insert((0, now));

        if now.duration_since(entry.1) >= self.window {
            entry.0 = 0;
            entry.1 = now;
        }

        let reset_secs = self
            .window
            .saturating_sub(now.duration_since(entry.1))
            .as_secs();

        if entry.0 >= self.requests_per_window {
            return RateDecision {
                allowed: false,
                remaining: 0,
                reset_secs,
            };
        }

        entry.0 += 1;
        RateDecision {
            allowed: true,
            remaining: self.requests_per_window - entry.0,
            reset_secs,
        }
    }

    /// 清除已過期的視窗
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.requests.len();
        self.requests
            .retain(|_, (_, started)| now.duration_since(*started) < self.window * 2);
        before - self.requests.len()
    }

    pub fn tracked_keys(&self) -> usize {
        self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_bucket_exhausts_capacity() {
        let bucket = TokenBucket::new(3, 0.001);
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test]
    async fn test_token_bucket_refills_over_time() {
        let bucket = TokenBucket::new(1, 50.0);
        bucket.acquire().await;
        assert!(!bucket.try_acquire());
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(bucket.try_acquire());
    }

    #[test]
    fn test_keyed_limiter_isolates_keys() {
        let limiter = KeyedRateLimiter::per_minute(2);

        let first = limiter.check("alice");
        assert!(first.allowed);
        assert_eq!(first.remaining, 1);
        assert!(limiter.check("alice").allowed);

        let blocked = limiter.check("alice");
        assert!(!blocked.allowed);
        assert_eq!(blocked.remaining, 0);
        assert!(blocked.reset_secs <= 60);

        assert!(limiter.check("bob").allowed);
        assert_eq!(limiter.tracked_keys(), 2);
    }

    #[test]
    fn test_keyed_limiter_window_resets() {
        let limiter = KeyedRateLimiter::new(1, Duration::from_millis(20));
        assert!(limiter.check("k").allowed);
        assert!(!limiter.check("k").allowed);
        std::thread::sleep(Duration::from_millis(30));
        assert!(limiter.check("k").allowed);
    }

    #[test]
    fn test_cleanup_drops_stale_windows() {
        let limiter = KeyedRateLimiter::new(5, Duration::from_millis(5));
        limiter.check("stale");
        std::thread::sleep(Duration::from_millis(15));
        assert_eq!(limiter.cleanup(), 1);
        assert_eq!(limiter.tracked_keys(), 0);
    }
}
