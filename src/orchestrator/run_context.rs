//! 单次运行的边界：时限和外部取消

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::error::{AppError, AppResult};

/// 单次运行的上下文
///
/// 由触发方提供；`guard` 包住的 future 在超时或收到关闭信号时被丢弃，
/// 其中所有等待（限流、请求、子任务）随之取消
#[derive(Debug, Clone)]
pub struct RunContext {
    timeout: Duration,
    deadline: Instant,
    shutdown: Option<watch::Receiver<bool>>,
}

impl RunContext {
    /// 从现在开始计时
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Instant::now() + timeout,
            shutdown: None,
        }
    }

    /// 关闭信号变为 `true` 时取消
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// 在时限和关闭信号的约束下运行 `fut`
    pub async fn guard<F, T>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        let shutdown = self.shutdown.clone();
        let cancelled = async move {
            match shutdown {
                Some(mut rx) => {
                    // 发送端已释放时不会再有关闭信号
                    if rx.wait_for(|stop| *stop).await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            result = fut => result,
            _ = sleep_until(self.deadline) => Err(AppError::Timeout(self.timeout)),
            _ = cancelled => Err(AppError::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_guard_times_out() {
        let ctx = RunContext::with_timeout(Duration::from_secs(600));
        let result: AppResult<()> = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AppError::Timeout(d)) if d == Duration::from_secs(600)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_guard_passes_result_through() {
        let ctx = RunContext::with_timeout(Duration::from_secs(10));
        let value = ctx.guard(async { Ok(42) }).await.unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels() {
        let (tx, rx) = watch::channel(false);
        let ctx = RunContext::with_timeout(Duration::from_secs(600)).with_shutdown(rx);

        let handle = tokio::spawn(async move {
            ctx.guard(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
            .await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let ctx = RunContext::with_timeout(Duration::from_secs(600)).with_shutdown(rx);
        let value = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok("done")
            })
            .await
            .unwrap();
        assert_eq!(value, "done");
    }
}
