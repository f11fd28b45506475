//! # Attendance Bot
//!
//! 一个用于 Moodle 门户自动考勤的 Rust 应用程序
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（cookie 会话、限流令牌），只暴露能力
//! - `SessionClient` - 唯一的会话 owner，提供 GET / POST / 登录能力
//! - `RateLimiter` - 所有 worker 共享的令牌桶
//!
//! ### ② 业务能力层（Services）
//! - `parsing/` - 纯函数页面解析，HTML → 领域实体
//! - `services/` - 描述"我能做什么"
//! - `Portal` - 登录 / 列表 / 查看 / 表单 / 提交 / 校验能力
//! - `NotificationSink` - 完成事件通知能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个考勤条目"的完整处理流程
//! - `AttendanceCtx` - 上下文封装（序号 + 课程 + 条目）
//! - `SubmissionFlow` - 状态机（view → form → submit → verify）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/runner` - 一次完整运行：登录、发现、分发
//! - `orchestrator/batch_processor` - 并发控制
//! - `schedule` - 工作日 / 周末触发计划
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod parsing;
pub mod schedule;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::{RateLimiter, SessionClient};
pub use models::{AttendanceItem, Course};
pub use orchestrator::{AttendanceRunner, RunContext, RunReport};
pub use parsing::PortalScraper;
pub use schedule::Schedules;
pub use services::{NotificationSink, Portal};
pub use workflow::{ItemOutcome, SubmissionFlow};
