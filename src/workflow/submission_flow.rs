//! 考勤提交流程 - 流程层
//!
//! 核心职责：定义"一个考勤条目"的完整处理流程
//!
//! 状态转移：
//! ```text
//! Listed → Viewed → FormFetched → Submitted → Verified(Done | NotDone)
//!                        └─ dry-run ─→ DryRun
//! 任一非终止状态 ─→ Failed(stage)
//! ```
//!
//! 失败只影响当前条目，不重试，不影响其他条目。

use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::models::{AttendanceItem, CompletionEvent, FormInfo, ViewInfo};
use crate::services::{NotificationSink, Portal};
use crate::workflow::attendance_ctx::AttendanceCtx;

/// 失败发生的阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailedStage {
    /// 打开查看页失败
    View,
    /// 获取表单失败或表单字段不全
    Form,
    /// 查看页与表单页会话标识不一致
    Mismatch,
    /// 提交失败
    Submit,
    /// 提交后校验失败
    Verify,
}

impl Display for FailedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailedStage::View => "view",
            FailedStage::Form => "form",
            FailedStage::Mismatch => "mismatch",
            FailedStage::Submit => "submit",
            FailedStage::Verify => "verify",
        };
        f.write_str(name)
    }
}

/// 提交后的校验结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verification {
    /// 状态页显示已签到
    Done,
    /// 状态页未显示已签到（正常结果，不是错误）
    NotDone,
}

/// 单个条目的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Listed,
    Viewed(ViewInfo),
    FormFetched { view: ViewInfo, form: FormInfo },
    Submitted,
    Verified(Verification),
    /// 演练模式在取得表单后停止
    DryRun,
    Failed { stage: FailedStage, reason: String },
}

/// 条目的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Done,
    NotDone,
    DryRun,
    Failed { stage: FailedStage, reason: String },
}

impl ItemOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, ItemOutcome::Failed { .. })
    }
}

impl ItemState {
    /// 终止状态对应的结果；非终止状态返回 `None`
    pub fn outcome(&self) -> Option<ItemOutcome> {
        match self {
            ItemState::Verified(Verification::Done) => Some(ItemOutcome::Done),
            ItemState::Verified(Verification::NotDone) => Some(ItemOutcome::NotDone),
            ItemState::DryRun => Some(ItemOutcome::DryRun),
            ItemState::Failed { stage, reason } => Some(ItemOutcome::Failed {
                stage: *stage,
                reason: reason.clone(),
            }),
            _ => None,
        }
    }

    fn failed(stage: FailedStage, reason: impl ToString) -> Self {
        ItemState::Failed {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// 考勤提交流程
///
/// - 编排单个条目的 查看 → 取表单 → 提交 → 校验
/// - 不持有会话，只依赖门户能力（Portal）
/// - 不处理并发和限流
pub struct SubmissionFlow {
    portal: Arc<dyn Portal>,
    sink: Arc<dyn NotificationSink>,
    dry_run: bool,
}

impl SubmissionFlow {
    /// 创建新的提交流程
    pub fn new(portal: Arc<dyn Portal>, sink: Arc<dyn NotificationSink>, dry_run: bool) -> Self {
        Self {
            portal,
            sink,
            dry_run,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// 运行到终止状态
    pub async fn run(&self, item: &AttendanceItem, ctx: &AttendanceCtx) -> ItemOutcome {
        let mut state = ItemState::Listed;
        loop {
            if let Some(outcome) = state.outcome() {
                self.log_outcome(ctx, &outcome);
                return outcome;
            }
            state = self.step(item, ctx, state).await;
        }
    }

    /// 执行一次状态转移
    pub async fn step(&self, item: &AttendanceItem, ctx: &AttendanceCtx, state: ItemState) -> ItemState {
        match state {
            ItemState::Listed => {
                debug!("{} 打开考勤查看页", ctx);
                match self.portal.view_attendance(item.id).await {
                    Ok(view) => ItemState::Viewed(view),
                    Err(e) => ItemState::failed(FailedStage::View, e),
                }
            }

            ItemState::Viewed(view) => {
                debug!("{} 获取提交表单 (sessid={})", ctx, view.session_id);
                match self
                    .portal
                    .get_form_info(&view.submit_link, &view.session_id, &view.sess_key)
                    .await
                {
                    Ok(form) if !form.matches(&view) => ItemState::failed(
                        FailedStage::Mismatch,
                        AppError::Mismatch {
                            view_sess_id: view.session_id.clone(),
                            form_sess_id: form.sess_id.clone(),
                        },
                    ),
                    Ok(form) if !form.is_complete() => {
                        ItemState::failed(FailedStage::Form, "表单字段不完整")
                    }
                    Ok(form) => ItemState::FormFetched { view, form },
                    Err(e @ AppError::Mismatch { .. }) => ItemState::failed(FailedStage::Mismatch, e),
                    Err(e) => ItemState::failed(FailedStage::Form, e),
                }
            }

            ItemState::FormFetched { form, .. } => {
                if self.dry_run {
                    return ItemState::DryRun;
                }
                info!("{} 📤 提交考勤", ctx);
                match self.portal.submit_attendance(&form).await {
                    Ok(()) => ItemState::Submitted,
                    Err(e) => ItemState::failed(FailedStage::Submit, e),
                }
            }

            ItemState::Submitted => match self.portal.check_submitted(item.id).await {
                Ok(true) => {
                    self.sink
                        .publish(CompletionEvent::new(&item.course.name, &item.name));
                    ItemState::Verified(Verification::Done)
                }
                Ok(false) => ItemState::Verified(Verification::NotDone),
                Err(e) => ItemState::failed(FailedStage::Verify, e),
            },

            terminal => terminal,
        }
    }

    fn log_outcome(&self, ctx: &AttendanceCtx, outcome: &ItemOutcome) {
        match outcome {
            ItemOutcome::Done => info!("{} ✅ 考勤已确认", ctx),
            ItemOutcome::NotDone => info!("{} 提交后状态页未显示已签到", ctx),
            ItemOutcome::DryRun => info!("{} 演练模式，跳过提交", ctx),
            ItemOutcome::Failed { stage, reason } => {
                warn!("{} ❌ 失败于 {}: {}", ctx, stage, reason)
            }
        }
    }
}
