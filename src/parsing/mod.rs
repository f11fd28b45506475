//! 页面解析层
//!
//! ## 职责
//!
//! 把门户返回的 HTML 文档转换为领域实体，纯函数、无网络、无状态。
//!
//! - `profile` - 带版本号的选择器表（页面结构变化时只改这里）
//! - `extractors` - 编译后的命名提取器
//! - `portal_scraper` - 各页面的解析操作
//!
//! 逐行容错：某一行无法解析时跳过并记录 debug 日志，不影响其余行。

pub mod extractors;
pub mod portal_scraper;
pub mod profile;

pub use extractors::Extractors;
pub use portal_scraper::{LoginPage, PortalScraper};
pub use profile::{MarkupProfile, MOODLE_ATTENDANCE_V1};
