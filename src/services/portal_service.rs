//! 门户服务 - 业务能力层
//!
//! 只负责"我能对门户做什么"：登录、列课程、列考勤、查看、取表单、提交、校验。
//! 不关心流程顺序，也不处理并发。

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::infrastructure::{resolve_url, SessionClient};
use crate::models::{AttendanceItem, Course, FormInfo, ViewInfo};
use crate::parsing::PortalScraper;

/// 门户能力
///
/// 流程层和编排层只依赖这个 trait，测试时可替换为内存实现
#[async_trait]
pub trait Portal: Send + Sync {
    /// 登录并确认会话有效
    async fn login(&self, username: &str, password: &str) -> AppResult<()>;

    /// 成绩总览页中的课程
    async fn list_courses(&self) -> AppResult<Vec<Course>>;

    /// 课程的考勤条目
    async fn list_attendance(&self, course: &Arc<Course>) -> AppResult<Vec<AttendanceItem>>;

    /// 打开考勤查看页，取得提交链接和会话标识
    async fn view_attendance(&self, attendance_id: u64) -> AppResult<ViewInfo>;

    /// 获取提交表单；会话标识与期望值不一致时返回 `AppError::Mismatch`
    async fn get_form_info(
        &self,
        submit_link: &str,
        want_sess_id: &str,
        want_sess_key: &str,
    ) -> AppResult<FormInfo>;

    /// 提交考勤表单
    async fn submit_attendance(&self, form: &FormInfo) -> AppResult<()>;

    /// 状态页是否显示已自助签到
    async fn check_submitted(&self, attendance_id: u64) -> AppResult<bool>;
}

/// 门户的五个地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub login_url: String,
    pub courses_url: String,
    pub attendance_list_url: String,
    pub attendance_url: String,
    pub attendance_form_url: String,
}

impl Endpoints {
    pub fn from_config(config: &Config) -> Self {
        Self {
            login_url: config.login_url.clone(),
            courses_url: config.courses_url.clone(),
            attendance_list_url: config.attendance_list_url.clone(),
            attendance_url: config.attendance_url.clone(),
            attendance_form_url: config.attendance_form_url.clone(),
        }
    }

    /// 课程考勤列表页
    pub fn attendance_list(&self, course_id: u64) -> String {
        format!("{}?id={}", self.attendance_list_url, course_id)
    }

    /// 考勤查看页（也是状态页）
    pub fn attendance_view(&self, attendance_id: u64) -> String {
        format!("{}?id={}", self.attendance_url, attendance_id)
    }
}

/// 基于 Moodle 页面的门户实现
pub struct MoodlePortal {
    client: SessionClient,
    scraper: PortalScraper,
    endpoints: Endpoints,
}

impl MoodlePortal {
    pub fn new(client: SessionClient, scraper: PortalScraper, endpoints: Endpoints) -> Self {
        Self {
            client,
            scraper,
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }
}

#[async_trait]
impl Portal for MoodlePortal {
    async fn login(&self, username: &str, password: &str) -> AppResult<()> {
        self.client
            .authenticate(
                &self.endpoints.login_url,
                &self.endpoints.courses_url,
                username,
                password,
                &self.scraper,
            )
            .await
    }

    async fn list_courses(&self) -> AppResult<Vec<Course>> {
        let page = self.client.fetch_document(&self.endpoints.courses_url).await?;
        let courses = page.parse(|doc| self.scraper.parse_courses(doc));
        debug!("成绩总览页解析出 {} 门课程", courses.len());
        Ok(courses)
    }

    async fn list_attendance(&self, course: &Arc<Course>) -> AppResult<Vec<AttendanceItem>> {
        let url = self.endpoints.attendance_list(course.id);
        let page = self.client.fetch_document(&url).await?;
        Ok(page.parse(|doc| self.scraper.parse_attendance_list(doc, course)))
    }

    async fn view_attendance(&self, attendance_id: u64) -> AppResult<ViewInfo> {
        let url = self.endpoints.attendance_view(attendance_id);
        let page = self.client.fetch_document(&url).await?;
        let mut view = page.parse(|doc| self.scraper.parse_view_info(doc))?;
        view.submit_link = resolve_url(&page.url, &view.submit_link)?;
        Ok(view)
    }

    async fn get_form_info(
        &self,
        submit_link: &str,
        want_sess_id: &str,
        want_sess_key: &str,
    ) -> AppResult<FormInfo> {
        let page = self.client.fetch_document(submit_link).await?;
        let form = page.parse(|doc| self.scraper.parse_form_info(doc));

        if form.sess_id != want_sess_id || form.sess_key != want_sess_key {
            return Err(AppError::Mismatch {
                view_sess_id: want_sess_id.to_string(),
                form_sess_id: form.sess_id,
            });
        }
        Ok(form)
    }

    async fn submit_attendance(&self, form: &FormInfo) -> AppResult<()> {
        let fields = form.to_fields();
        self.client
            .submit_form(&self.endpoints.attendance_form_url, &fields)
            .await?;
        Ok(())
    }

    async fn check_submitted(&self, attendance_id: u64) -> AppResult<bool> {
        let url = self.endpoints.attendance_view(attendance_id);
        let page = self.client.fetch_document(&url).await?;
        Ok(page.parse(|doc| self.scraper.is_self_recorded(doc)))
    }
}
