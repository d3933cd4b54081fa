//! Token-bucket limiter shared by every recognition worker.
//!
//! The bucket refills continuously at `rpm / 60` tokens per second up to its
//! burst size. Waiters reserve a token up front, driving the balance negative,
//! and sleep until the refill has paid the reservation back. That keeps
//! grants in arrival order without a separate queue.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::context::Deadline;
use crate::error::RateLimitError;

/// Burst size for a given per-minute budget.
///
/// One tenth of the budget, never more than one sixth, never less than one.
pub fn burst_for_rpm(rpm: u32) -> u32 {
    (rpm / 10).min(rpm / 6).max(1)
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Requests-per-minute limiter.
#[derive(Debug)]
pub struct RateLimiter {
    rpm: u32,
    burst: u32,
    /// Tokens per second.
    rate: f64,
    bucket: Mutex<Bucket>,
}

impl RateLimiter {
    /// Create a limiter for `rpm` requests per minute, starting full.
    pub fn new(rpm: u32) -> Self {
        let rpm = rpm.max(1);
        let burst = burst_for_rpm(rpm);
        Self {
            rpm,
            burst,
            rate: f64::from(rpm) / 60.0,
            bucket: Mutex::new(Bucket {
                tokens: f64::from(burst),
                last: Instant::now(),
            }),
        }
    }

    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    pub fn burst(&self) -> u32 {
        self.burst
    }

    /// Refill rate in tokens per second.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Tokens available right now. Negative while waiters hold reservations.
    pub fn available(&self) -> f64 {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens
    }

    /// Take a token if one is available now, without waiting.
    pub fn try_acquire(&self) -> bool {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Wait for a token.
    ///
    /// Fails immediately if `deadline` is already cancelled or expired, or if
    /// the wait could not finish before it expires; in that case no token is
    /// consumed. A wait interrupted by cancellation gives its token back.
    pub async fn wait(&self, deadline: &Deadline) -> Result<(), RateLimitError> {
        deadline.check()?;

        let delay = {
            let mut bucket = self.lock();
            let now = Instant::now();
            self.refill(&mut bucket, now);
            bucket.tokens -= 1.0;
            if bucket.tokens >= 0.0 {
                return Ok(());
            }

            let delay = Duration::from_secs_f64(-bucket.tokens / self.rate);
            if now + delay >= deadline.expires_at() {
                bucket.tokens += 1.0;
                return Err(RateLimitError::DeadlineExceeded);
            }
            delay
        };

        debug!(delay_ms = delay.as_millis() as u64, "Waiting for rate limit token");

        match deadline.run(tokio::time::sleep(delay)).await {
            Ok(()) => Ok(()),
            Err(interrupt) => {
                self.give_back();
                Err(interrupt.into())
            }
        }
    }

    fn give_back(&self) {
        let mut bucket = self.lock();
        self.refill(&mut bucket, Instant::now());
        bucket.tokens = (bucket.tokens + 1.0).min(f64::from(self.burst));
    }

    fn refill(&self, bucket: &mut Bucket, now: Instant) {
        let elapsed = now.saturating_duration_since(bucket.last).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.rate).min(f64::from(self.burst));
        bucket.last = now;
    }

    fn lock(&self) -> MutexGuard<'_, Bucket> {
        // The bucket is plain numbers; a panic mid-update cannot leave it unusable.
        self.bucket.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_burst_for_rpm() {
        assert_eq!(burst_for_rpm(1), 1);
        assert_eq!(burst_for_rpm(5), 1);
        assert_eq!(burst_for_rpm(6), 1);
        assert_eq!(burst_for_rpm(60), 6);
        assert_eq!(burst_for_rpm(600), 60);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rpm_60_grants_burst_then_one_per_second() {
        let limiter = RateLimiter::new(60);
        assert_eq!(limiter.burst(), 6);
        assert_eq!(limiter.rate(), 1.0);

        let granted = (0..10).filter(|_| limiter.try_acquire()).count();
        assert_eq!(granted, 6);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_paces_requests() {
        let limiter = Arc::new(RateLimiter::new(60));
        let parent = CancellationToken::new();
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = limiter.clone();
            let deadline = Deadline::new(&parent, Duration::from_secs(60));
            handles.push(tokio::spawn(async move {
                limiter.wait(&deadline).await.unwrap();
                Instant::now().duration_since(start)
            }));
        }

        let mut elapsed = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        let immediate = elapsed.iter().filter(|d| d.is_zero()).count();
        assert_eq!(immediate, 6);
        // The rest trickle out at one per second.
        for (i, d) in elapsed[6..].iter().enumerate() {
            let expected = Duration::from_secs(i as u64 + 1);
            assert!(
                *d >= expected - Duration::from_millis(5) && *d <= expected + Duration::from_millis(5),
                "grant {} at {:?}",
                i + 6,
                d
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_fails_fast_past_deadline() {
        let limiter = RateLimiter::new(60);
        let parent = CancellationToken::new();
        while limiter.try_acquire() {}

        let deadline = Deadline::new(&parent, Duration::from_millis(500));
        let start = Instant::now();
        let err = limiter.wait(&deadline).await.unwrap_err();

        assert_eq!(err, RateLimitError::DeadlineExceeded);
        assert_eq!(Instant::now(), start);
        // The failed wait left the balance untouched.
        assert!(limiter.available() >= 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_context_fails_immediately() {
        let limiter = RateLimiter::new(60);
        let parent = CancellationToken::new();
        let deadline = Deadline::new(&parent, Duration::from_secs(60));
        parent.cancel();

        assert_eq!(limiter.wait(&deadline).await, Err(RateLimitError::Cancelled));
        assert_eq!(limiter.available(), 6.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_wait_returns_token() {
        let limiter = Arc::new(RateLimiter::new(60));
        while limiter.try_acquire() {}

        let parent = CancellationToken::new();
        let deadline = Deadline::new(&parent, Duration::from_secs(60));
        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.wait(&deadline).await })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        parent.cancel();
        assert_eq!(waiter.await.unwrap(), Err(RateLimitError::Cancelled));

        // 0.1s of refill, reservation returned.
        let available = limiter.available();
        assert!((available - 0.1).abs() < 0.01, "available = {}", available);
    }
}
