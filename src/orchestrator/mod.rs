//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责一次运行的发现、并发调度和统计，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `runner` - 考勤运行器
//! - 登录并建立唯一会话
//! - 串行列出课程和考勤条目（按学期过滤）
//! - 同一时刻只允许一次运行
//! - 运行结束后等待通知发送完毕并输出统计
//!
//! ### `batch_processor` - 批量处理器
//! - 控制并发数量（Semaphore）
//! - 每个条目一个任务，失败互不影响
//!
//! ### `run_context` - 运行边界
//! - 整次运行时限和外部取消
//!
//! ## 层次关系
//!
//! ```text
//! runner (登录 + 发现 Vec<AttendanceItem>)
//!     ↓
//! batch_processor (并发处理 Vec<AttendanceItem>)
//!     ↓
//! workflow::SubmissionFlow (处理单个条目)
//!     ↓
//! services (能力层：portal / notifier)
//!     ↓
//! infrastructure (基础设施：SessionClient / RateLimiter)
//! ```

pub mod batch_processor;
pub mod run_context;
pub mod runner;

// 重新导出主要类型
pub use batch_processor::{BatchProcessor, BatchStats};
pub use run_context::RunContext;
pub use runner::{AttendanceRunner, RunReport};
