//! 集成测试共用的内存门户和通知接收方

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use attendance_bot::error::{AppError, AppResult, AuthError, NetworkError};
use attendance_bot::models::{AttendanceItem, CompletionEvent, Course, FormInfo, ViewInfo};
use attendance_bot::services::{NotificationSink, Portal};

pub fn course(id: u64, name: &str, periode: &str) -> Course {
    Course {
        id,
        name: name.to_string(),
        link: format!("https://portal.test/course/user.php?id={}", id),
        periode: periode.to_string(),
        group: "A1".to_string(),
        grade: None,
    }
}

pub fn item(id: u64, course: &Arc<Course>) -> AttendanceItem {
    AttendanceItem {
        id,
        title: format!("Pertemuan {}", id),
        name: format!("Presensi {}", id),
        link: format!("https://portal.test/mod/attendance/view.php?id={}", id),
        course: Arc::clone(course),
    }
}

/// 可配置行为的内存门户
#[derive(Default)]
pub struct MockPortal {
    pub courses: Vec<Course>,
    /// 课程ID → 考勤ID
    pub items: HashMap<u64, Vec<u64>>,
    pub fail_login: bool,
    pub fail_courses: bool,
    pub fail_list: HashSet<u64>,
    pub fail_view: HashSet<u64>,
    /// 表单返回不同的 sessid
    pub mismatch: HashSet<u64>,
    /// 表单缺少 status
    pub incomplete: HashSet<u64>,
    /// 提交后状态页不显示已签到
    pub not_done: HashSet<u64>,
    /// 查看页的响应延迟
    pub view_delay: Duration,

    pub submits: AtomicUsize,
    pub submitted: Mutex<Vec<String>>,
    pub listed: Mutex<Vec<u64>>,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl MockPortal {
    /// 一门课程，考勤ID 为 `ids`
    pub fn with_items(ids: impl IntoIterator<Item = u64>) -> Self {
        let mut portal = Self {
            courses: vec![course(1, "Algoritma", "2401")],
            ..Default::default()
        };
        portal.items.insert(1, ids.into_iter().collect());
        portal
    }

    pub fn submit_count(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn sess_id_of(link: &str) -> u64 {
        link.rsplit("sessid=")
            .next()
            .and_then(|rest| rest.split('&').next())
            .and_then(|id| id.parse().ok())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Portal for MockPortal {
    async fn login(&self, _username: &str, _password: &str) -> AppResult<()> {
        if self.fail_login {
            return Err(AuthError::StillUnauthenticated.into());
        }
        Ok(())
    }

    async fn list_courses(&self) -> AppResult<Vec<Course>> {
        if self.fail_courses {
            return Err(NetworkError::UnexpectedStatus {
                url: "https://portal.test/grade/report/overview/index.php".to_string(),
                status: 503,
            }
            .into());
        }
        Ok(self.courses.clone())
    }

    async fn list_attendance(&self, course: &Arc<Course>) -> AppResult<Vec<AttendanceItem>> {
        self.listed.lock().unwrap().push(course.id);
        if self.fail_list.contains(&course.id) {
            return Err(NetworkError::UnexpectedStatus {
                url: format!("https://portal.test/mod/attendance/index.php?id={}", course.id),
                status: 500,
            }
            .into());
        }
        Ok(self
            .items
            .get(&course.id)
            .map(|ids| ids.iter().map(|id| item(*id, course)).collect())
            .unwrap_or_default())
    }

    async fn view_attendance(&self, attendance_id: u64) -> AppResult<ViewInfo> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.view_delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_view.contains(&attendance_id) {
            return Err(AppError::missing_element("view.submit_link"));
        }
        Ok(ViewInfo {
            session_id: attendance_id.to_string(),
            sess_key: "k3y".to_string(),
            submit_link: format!(
                "https://portal.test/mod/attendance/attendance.php?sessid={}&sesskey=k3y",
                attendance_id
            ),
        })
    }

    async fn get_form_info(
        &self,
        submit_link: &str,
        _want_sess_id: &str,
        want_sess_key: &str,
    ) -> AppResult<FormInfo> {
        let id = Self::sess_id_of(submit_link);
        let sess_id = if self.mismatch.contains(&id) {
            format!("{}9", id)
        } else {
            id.to_string()
        };
        let status = if self.incomplete.contains(&id) {
            String::new()
        } else {
            "1502".to_string()
        };

        Ok(FormInfo {
            sess_id,
            sess_key: want_sess_key.to_string(),
            qf_token: "1".to_string(),
            is_expanded: "1".to_string(),
            status,
        })
    }

    async fn submit_attendance(&self, form: &FormInfo) -> AppResult<()> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        self.submitted.lock().unwrap().push(form.sess_id.clone());
        Ok(())
    }

    async fn check_submitted(&self, attendance_id: u64) -> AppResult<bool> {
        Ok(!self.not_done.contains(&attendance_id))
    }
}

/// 记录所有事件的通知接收方
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<CompletionEvent>>,
}

impl RecordingSink {
    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn publish(&self, event: CompletionEvent) {
        self.events.lock().unwrap().push(event);
    }
}
