//! Token-bucket rate limiter for outbound API calls.
//!
//! Continuous refill: available tokens are recomputed from elapsed wall-clock
//! time on every acquisition, capped at the burst size. Token accounting is
//! serialized behind a mutex, but the actual wait happens outside the
//! critical section. A caller that must sleep first reserves its slot by
//! driving the balance negative, so later callers queue up behind it without
//! blocking each other's bookkeeping.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    requests_per_second: f64,
    burst_size: f64,
    state: Mutex<State>,
}

struct State {
    tokens: f64,
    last_update: Option<Instant>,
}

impl RateLimiter {
    pub fn new(requests_per_second: f64, burst_size: usize) -> Self {
        Self {
            requests_per_second,
            burst_size: burst_size as f64,
            state: Mutex::new(State {
                tokens: burst_size as f64,
                last_update: None,
            }),
        }
    }

    /// Consume one token, sleeping until one is available if the bucket is
    /// empty. Tokens are consumed, not leased; there is nothing to release.
    pub async fn acquire(&self) {
        let wait = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            if let Some(last) = state.last_update {
                let refill = now.duration_since(last).as_secs_f64() * self.requests_per_second;
                state.tokens = (state.tokens + refill).min(self.burst_size);
            }
            state.last_update = Some(now);

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                None
            } else {
                let wait = (1.0 - state.tokens) / self.requests_per_second;
                state.tokens -= 1.0;
                Some(Duration::from_secs_f64(wait))
            }
        };

        if let Some(wait) = wait {
            tracing::trace!(wait_secs = wait.as_secs_f64(), "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn tokens(limiter: &RateLimiter) -> f64 {
        limiter.state.lock().await.tokens
    }

    #[tokio::test(start_paused = true)]
    async fn first_acquire_is_immediate() {
        let limiter = RateLimiter::new(10.0, 10);
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(tokens(&limiter).await, 9.0);
    }

    #[tokio::test(start_paused = true)]
    async fn burst_acquires_are_immediate() {
        let limiter = RateLimiter::new(10.0, 5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(tokens(&limiter).await < 1.0);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_when_tokens_exhausted() {
        let limiter = RateLimiter::new(10.0, 1);
        limiter.acquire().await;

        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_refill_over_time() {
        let limiter = RateLimiter::new(10.0, 2);
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(tokens(&limiter).await < 1.0);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_cap_at_burst_size() {
        let limiter = RateLimiter::new(10.0, 3);
        limiter.acquire().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        limiter.acquire().await;

        assert!(tokens(&limiter).await <= 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_acquires_respect_rate() {
        let limiter = Arc::new(RateLimiter::new(10.0, 2));

        let start = Instant::now();
        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.acquire().await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        // 2 burst tokens, then 2 waiters at 10 rps: ~0.2s total.
        assert!(start.elapsed() >= Duration::from_millis(180));
    }

    #[tokio::test(start_paused = true)]
    async fn independent_limiters_do_not_share_tokens() {
        let a = RateLimiter::new(10.0, 1);
        let b = RateLimiter::new(10.0, 5);

        a.acquire().await;
        b.acquire().await;

        assert!(tokens(&a).await < 1.0);
        assert!(tokens(&b).await >= 4.0);
    }
}
