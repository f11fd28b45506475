//! 批量考勤处理器 - 编排层
//!
//! ## 职责
//!
//! 把发现阶段得到的条目列表分发给有限数量的 worker。
//!
//! ## 核心功能
//!
//! 1. **并发控制**：Semaphore 限制同时运行的流程数为 max(并发下限, 配置并发数)
//! 2. **故障隔离**：单个条目的失败只计入统计，不影响其他条目
//! 3. **整体取消**：超时或关闭时丢弃 JoinSet，所有进行中的任务随之中止
//!
//! 条目完成顺序不确定，调用方不应依赖。

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info_span, Instrument};

use crate::error::{AppError, AppResult};
use crate::models::AttendanceItem;
use crate::orchestrator::run_context::RunContext;
use crate::workflow::{AttendanceCtx, ItemOutcome, SubmissionFlow};

/// 批次处理结果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchStats {
    pub total: usize,
    pub done: usize,
    pub not_done: usize,
    pub dry_run: usize,
    pub failed: usize,
}

impl BatchStats {
    fn record(&mut self, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Done => self.done += 1,
            ItemOutcome::NotDone => self.not_done += 1,
            ItemOutcome::DryRun => self.dry_run += 1,
            ItemOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// 批量考勤处理器
pub struct BatchProcessor {
    flow: Arc<SubmissionFlow>,
    workers: usize,
}

impl BatchProcessor {
    /// `workers` 为实际 worker 数（已取过 max）
    pub fn new(flow: Arc<SubmissionFlow>, workers: usize) -> Self {
        Self {
            flow,
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// 处理所有条目
    ///
    /// 条目失败不会返回错误；只有超时或取消会让整批返回错误
    pub async fn run(&self, items: Vec<AttendanceItem>, ctx: &RunContext) -> AppResult<BatchStats> {
        ctx.guard(self.process_all(items)).await
    }

    async fn process_all(&self, items: Vec<AttendanceItem>) -> AppResult<BatchStats> {
        let total = items.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for (idx, item) in items.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| AppError::Cancelled)?;
            let flow = Arc::clone(&self.flow);
            let ctx = AttendanceCtx::new(idx + 1, total, &item);
            let span = info_span!("attendance", id = item.id, course = %item.course.name);

            tasks.spawn(
                async move {
                    let _permit = permit;
                    flow.run(&item, &ctx).await
                }
                .instrument(span),
            );
        }

        let mut stats = BatchStats {
            total,
            ..Default::default()
        };
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => stats.record(&outcome),
                Err(e) => {
                    error!("考勤任务异常结束: {}", e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}
