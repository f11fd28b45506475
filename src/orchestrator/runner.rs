//! 考勤运行器 - 编排层
//!
//! ## 职责
//!
//! 一次完整运行：登录 → 列课程 → 逐课程列考勤 → 并发提交。
//!
//! 发现阶段严格串行，建立唯一的会话和权威的条目列表后才开始并发；
//! 并发阶段 worker 只读共享会话。
//!
//! ## 错误传播
//!
//! - 登录失败、超时、取消：整次运行失败
//! - 单门课程的考勤列表失败：记录日志，跳过该课程
//! - 单个条目失败：由 `SubmissionFlow` 记录，计入统计

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::AppResult;
use crate::infrastructure::{ClientSettings, RateLimiter, SessionClient};
use crate::models::AttendanceItem;
use crate::orchestrator::batch_processor::{BatchProcessor, BatchStats};
use crate::orchestrator::run_context::RunContext;
use crate::parsing::PortalScraper;
use crate::services::{Endpoints, MoodlePortal, NoopSink, NotificationSink, Portal, WebhookNotifier};
use crate::utils::logging::{log_items_discovered, print_final_stats};
use crate::workflow::SubmissionFlow;

/// 单次运行报告
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// 参与处理的课程数（已按学期过滤）
    pub courses: usize,
    pub stats: BatchStats,
    /// 上一次运行尚未结束，本次触发被跳过
    pub skipped: bool,
}

/// 考勤运行器
pub struct AttendanceRunner {
    username: String,
    password: String,
    current_periode: String,
    dry_run: bool,
    portal: Arc<dyn Portal>,
    sink: Arc<dyn NotificationSink>,
    processor: BatchProcessor,
    running: Mutex<()>,
}

impl AttendanceRunner {
    /// 用已构建好的门户和通知组件创建运行器
    pub fn new(config: &Config, portal: Arc<dyn Portal>, sink: Arc<dyn NotificationSink>) -> Self {
        let flow = Arc::new(SubmissionFlow::new(
            Arc::clone(&portal),
            Arc::clone(&sink),
            config.dry_run,
        ));
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            current_periode: config.current_periode.clone(),
            dry_run: config.dry_run,
            portal,
            sink,
            processor: BatchProcessor::new(flow, config.worker_count()),
            running: Mutex::new(()),
        }
    }

    /// 按配置组装全部组件
    pub fn from_config(config: &Config) -> AppResult<Self> {
        let limiter = Arc::new(RateLimiter::new(config.rate_per_sec, config.rate_burst));
        let client = SessionClient::new(&ClientSettings::from_config(config), limiter)?;
        let portal = MoodlePortal::new(client, PortalScraper::moodle()?, Endpoints::from_config(config));

        let sink: Arc<dyn NotificationSink> = if config.notifications_enabled() {
            Arc::new(WebhookNotifier::new(config)?)
        } else {
            Arc::new(NoopSink)
        };

        Ok(Self::new(config, Arc::new(portal), sink))
    }

    /// 通知组件（关闭时用于等待未完成的发送）
    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// 执行一次完整运行
    pub async fn run_attendance(&self, ctx: &RunContext) -> AppResult<RunReport> {
        let Ok(_running) = self.running.try_lock() else {
            warn!("⚠️ 上一次运行尚未结束，跳过本次触发");
            return Ok(RunReport {
                skipped: true,
                ..Default::default()
            });
        };

        let result = self.run_once(ctx).await;
        self.sink.drain().await;

        if let Ok(report) = &result {
            print_final_stats(report);
        }
        result
    }

    async fn run_once(&self, ctx: &RunContext) -> AppResult<RunReport> {
        let (courses, items) = ctx.guard(self.discover()).await?;

        if items.is_empty() {
            info!("没有找到考勤条目");
            return Ok(RunReport {
                courses,
                ..Default::default()
            });
        }

        log_items_discovered(items.len(), self.processor.workers(), self.dry_run);
        let stats = self.processor.run(items, ctx).await?;

        Ok(RunReport {
            courses,
            stats,
            skipped: false,
        })
    }

    /// 发现阶段：登录并收集所有考勤条目
    async fn discover(&self) -> AppResult<(usize, Vec<AttendanceItem>)> {
        self.portal.login(&self.username, &self.password).await?;

        let mut courses = self.portal.list_courses().await?;
        courses.sort_by(|a, b| a.name.cmp(&b.name));
        info!("📚 共 {} 门课程", courses.len());

        let mut course_count = 0;
        let mut items = Vec::new();
        for course in courses {
            if !course.in_periode(&self.current_periode) {
                info!(
                    "跳过非当前学期课程: {} (学期 {}, 当前 {})",
                    course.name, course.periode, self.current_periode
                );
                continue;
            }
            course_count += 1;

            let course = Arc::new(course);
            info!("获取考勤列表: {}", course.name);
            match self.portal.list_attendance(&course).await {
                Ok(found) => {
                    info!("✓ {} 有 {} 个考勤条目", course.name, found.len());
                    items.extend(found);
                }
                Err(e) => {
                    warn!("获取 {} 的考勤列表失败，跳过该课程: {}", course.name, e);
                }
            }
        }

        Ok((course_count, items))
    }
}
