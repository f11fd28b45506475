//! 考勤处理上下文
//!
//! 封装"我正在处理第几个考勤条目、属于哪门课"这一信息

use std::fmt::Display;

use crate::models::AttendanceItem;

/// 考勤处理上下文
#[derive(Debug, Clone)]
pub struct AttendanceCtx {
    /// 条目序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次运行的条目总数
    pub total: usize,

    /// 考勤ID
    pub attendance_id: u64,

    /// 课程名
    pub course_name: String,

    /// 考勤名
    pub item_name: String,
}

impl AttendanceCtx {
    /// 创建新的考勤上下文
    pub fn new(index: usize, total: usize, item: &AttendanceItem) -> Self {
        Self {
            index,
            total,
            attendance_id: item.id,
            course_name: item.course.name.clone(),
            item_name: item.name.clone(),
        }
    }
}

impl Display for AttendanceCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[考勤 {}/{} #{} {} / {}]",
            self.index, self.total, self.attendance_id, self.course_name, self.item_name
        )
    }
}
