use std::fmt::Display;
use std::sync::Arc;

use crate::models::Course;

/// 考勤条目
///
/// 每次运行从课程的考勤列表页重新生成，不持久化
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceItem {
    /// 考勤ID（取自链接中的 `id=`）
    pub id: u64,
    pub title: String,
    pub name: String,
    pub link: String,
    /// 所属课程
    pub course: Arc<Course>,
}

impl Display for AttendanceItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} / {} #{}]", self.course.name, self.name, self.id)
    }
}

/// 考勤查看页中提取的信息
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewInfo {
    pub session_id: String,
    pub sess_key: String,
    pub submit_link: String,
}

/// 考勤提交表单中提取的信息
///
/// 缺失的输入框对应空字符串，是否足以提交由流程层判断
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FormInfo {
    pub sess_id: String,
    pub sess_key: String,
    /// `_qf__mod_attendance_form_studentattendance`
    pub qf_token: String,
    /// `mform_isexpanded_id_session`
    pub is_expanded: String,
    pub status: String,
}

impl FormInfo {
    /// 会话标识是否与查看页一致
    pub fn matches(&self, view: &ViewInfo) -> bool {
        self.sess_id == view.session_id && self.sess_key == view.sess_key
    }

    /// 提交所需的其余字段是否齐全
    pub fn is_complete(&self) -> bool {
        !self.qf_token.is_empty() && !self.status.is_empty()
    }

    /// 组装提交表单字段
    pub fn to_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("sessid", self.sess_id.clone()),
            ("sesskey", self.sess_key.clone()),
            ("_qf__mod_attendance_form_studentattendance", self.qf_token.clone()),
            ("mform_isexpanded_id_session", self.is_expanded.clone()),
            ("status", self.status.clone()),
            ("submitbutton", "Save changes".to_string()),
        ]
    }
}
