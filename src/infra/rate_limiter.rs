use crate::app::ports::RateLimiterPort;
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Token bucket limiting outgoing requests per minute
#[derive(Debug)]
pub struct RequestRateLimiter {
    requests_per_min: u64,
    // tokens available and the time of the last refill
    bucket: Mutex<(f64, Instant)>,
}

impl RequestRateLimiter {
    pub fn new(requests_per_min: u64) -> Self {
        Self {
            requests_per_min,
            bucket: Mutex::new((requests_per_min as f64, Instant::now())),
        }
    }

    async fn consume_token(&self) {
        let capacity = self.requests_per_min as f64;
        let refill_rate = capacity / 60.0; // tokens per second
        loop {
            let mut guard = self.bucket.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            // wait until one token has accumulated
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}

#[async_trait]
impl RateLimiterPort for RequestRateLimiter {
    async fn acquire(&self) {
        if self.requests_per_min > 0 {
            self.consume_token().await;
        }
    }
}

/// Limiter that never waits
pub struct Unlimited;

#[async_trait]
impl RateLimiterPort for Unlimited {
    async fn acquire(&self) {}
}
