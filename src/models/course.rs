use serde::{Deserialize, Serialize};

/// 课程
///
/// 来自成绩总览页的一行；id、periode、group 任一缺失则整行丢弃
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    /// 课程ID（取自链接中的 `id=`）
    pub id: u64,
    /// 去掉学期 / 分组后缀后的课程名
    pub name: String,
    /// 课程链接
    pub link: String,
    /// 学期代码（4 位数字）
    pub periode: String,
    /// 分组代码（字母 + 数字，例如 A1）
    pub group: String,
    /// 成绩（可选）
    pub grade: Option<i64>,
}

impl Course {
    /// 是否属于指定学期；`periode` 为空时视为不过滤
    pub fn in_periode(&self, periode: &str) -> bool {
        periode.is_empty() || self.periode == periode
    }
}
