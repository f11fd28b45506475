//! 令牌桶限流器 - 基础设施层
//!
//! 所有 worker 共用一个实例；每个出站请求前先取一个令牌。
//! 等待本身可以被取消：丢弃 `acquire()` 返回的 future 即放弃等待，不会消耗令牌。

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::trace;

/// 令牌桶限流器
#[derive(Debug)]
pub struct RateLimiter {
    /// 每秒补充的令牌数，非正数表示不限流
    rate_per_sec: f64,
    /// 桶容量
    burst: f64,
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

impl RateLimiter {
    /// 创建限流器，初始时桶是满的
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate_per_sec,
            burst,
            bucket: Mutex::new(Bucket {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// 不限流的实例
    pub fn unlimited() -> Self {
        Self::new(0.0, 1)
    }

    pub fn is_unlimited(&self) -> bool {
        self.rate_per_sec.is_nan() || self.rate_per_sec <= 0.0
    }

    /// 取一个令牌，必要时等待
    pub async fn acquire(&self) {
        if self.is_unlimited() {
            return;
        }

        loop {
            let wait = {
                let mut bucket = self.bucket.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(bucket.last_refill).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate_per_sec).min(self.burst);
                bucket.last_refill = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return;
                }
                Duration::from_secs_f64((1.0 - bucket.tokens) / self.rate_per_sec)
            };

            trace!("限流等待 {:?}", wait);
            sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_then_steady_rate() {
        let limiter = RateLimiter::new(2.0, 3);
        let start = Instant::now();

        // 桶满时前 3 个立即拿到
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(10));

        // 之后每个令牌需要 500ms
        limiter.acquire().await;
        limiter.acquire().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(990), "elapsed = {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1100), "elapsed = {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_across_tasks() {
        let limiter = Arc::new(RateLimiter::new(1.0, 1));
        let start = Instant::now();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let limiter = Arc::clone(&limiter);
            handles.push(tokio::spawn(async move { limiter.acquire().await }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // 1 个初始令牌 + 3 个各等 1 秒
        assert!(start.elapsed() >= Duration::from_millis(2990));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_can_be_cancelled() {
        let limiter = RateLimiter::new(0.1, 1);
        limiter.acquire().await;

        // 下一个令牌要 10 秒，超时后放弃等待
        let result = tokio::time::timeout(Duration::from_secs(1), limiter.acquire()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = RateLimiter::unlimited();
        assert!(limiter.is_unlimited());
        for _ in 0..100 {
            limiter.acquire().await;
        }
    }

    #[test]
    fn test_non_positive_or_nan_rate_is_unlimited() {
        assert!(RateLimiter::new(-1.0, 2).is_unlimited());
        assert!(RateLimiter::new(f64::NAN, 2).is_unlimited());
        assert!(!RateLimiter::new(0.5, 2).is_unlimited());
    }
}
