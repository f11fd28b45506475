use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// 考勤确认完成事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionEvent {
    pub course_name: String,
    pub item_name: String,
    pub at: DateTime<Local>,
}

impl CompletionEvent {
    pub fn new(course_name: impl Into<String>, item_name: impl Into<String>) -> Self {
        Self {
            course_name: course_name.into(),
            item_name: item_name.into(),
            at: Local::now(),
        }
    }

    /// RFC3339 格式的时间
    pub fn timestamp(&self) -> String {
        self.at.to_rfc3339()
    }
}

/// 发往通知网关的一条消息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMessage {
    pub message: String,
    #[serde(rename = "groupId")]
    pub group_id: String,
}
