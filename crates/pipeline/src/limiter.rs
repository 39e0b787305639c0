//! Token-bucket pacing for external calls.
//!
//! The bucket holds up to `capacity` tokens and gains one every
//! `refill_every`. [`RateLimiter::acquire`] takes a token, sleeping until one
//! is available. The limiter is shared between concurrent tasks through an
//! `Arc`.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

#[derive(Debug)]
struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_every: Duration,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// A full bucket of `capacity` tokens (at least one).
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            refill_every: refill_every.max(Duration::from_millis(1)),
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    /// `per_minute` calls per minute with bursts of the same size.
    pub fn per_minute(per_minute: u32) -> Self {
        let per_minute = per_minute.max(1);
        Self::new(per_minute, Duration::from_secs(60) / per_minute)
    }

    /// Wait for and take one token.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                self.refill(&mut bucket);
                if bucket.tokens > 0 {
                    bucket.tokens -= 1;
                    return;
                }
                self.refill_every
                    .saturating_sub(bucket.last_refill.elapsed())
                    .max(Duration::from_millis(1))
            };
            tracing::trace!(wait_ms = wait.as_millis() as u64, "Rate limiter waiting for a token");
            sleep(wait).await;
        }
    }

    /// Take a token only if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    fn refill(&self, bucket: &mut Bucket) {
        let elapsed = bucket.last_refill.elapsed();
        let earned = (elapsed.as_nanos() / self.refill_every.as_nanos()) as u64;
        if earned == 0 {
            return;
        }
        let room = u64::from(self.capacity - bucket.tokens);
        if earned >= room {
            bucket.tokens = self.capacity;
            bucket.last_refill = Instant::now();
        } else {
            bucket.tokens += earned as u32;
            bucket.last_refill += self.refill_every * earned as u32;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn burst_up_to_capacity_then_waits() {
        let limiter = RateLimiter::new(2, Duration::from_secs(1));
        let start = Instant::now();

        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() < Duration::from_millis(10));

        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_come_back_over_time() {
        let limiter = RateLimiter::new(1, Duration::from_millis(500));
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn refill_never_exceeds_capacity() {
        let limiter = RateLimiter::new(3, Duration::from_millis(100));
        tokio::time::advance(Duration::from_secs(10)).await;

        for _ in 0..3 {
            assert!(limiter.try_acquire().await);
        }
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn per_minute_spaces_calls() {
        let limiter = RateLimiter::per_minute(60);
        for _ in 0..60 {
            assert!(limiter.try_acquire().await);
        }
        assert!(!limiter.try_acquire().await);
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire().await);
    }
}
