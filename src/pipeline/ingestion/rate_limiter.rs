use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Requests-per-minute token bucket gating page fetches.
#[derive(Debug)]
pub struct RateLimiter {
    requests_per_min: Option<u64>,
    // tokens available and the time of the last refill
    bucket: Mutex<(f64, Instant)>,
}

impl RateLimiter {
    pub fn new(requests_per_min: Option<u64>) -> Self {
        let capacity = requests_per_min.unwrap_or(0) as f64;
        Self {
            requests_per_min,
            bucket: Mutex::new((capacity, Instant::now())),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(None)
    }

    /// Wait until one request may be issued.
    pub async fn acquire(&self) {
        let capacity = match self.requests_per_min {
            Some(rpm) if rpm > 0 => rpm as f64,
            _ => return,
        };
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
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}
