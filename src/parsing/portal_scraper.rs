//! 门户页面解析
//!
//! 所有函数都是 `&Html → 实体` 的纯函数，不持有任何可变状态。

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::debug;

use crate::error::{AppError, AppResult, ParseError};
use crate::models::{AttendanceItem, Course, FormInfo, ViewInfo};
use crate::parsing::extractors::Extractors;
use crate::parsing::profile::{
    MarkupProfile, MOODLE_ATTENDANCE_V1, NO_ATTENDANCE_NOTICE, SELF_RECORDED_TEXT,
    SUBMIT_ANCHOR_TEXT,
};

/// 登录页中提取的信息
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginPage {
    /// `logintoken` 的值
    pub token: Option<String>,
    /// 已存在会话时的登出表单
    pub logout: Option<LogoutForm>,
}

/// 登出表单
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogoutForm {
    pub action: Option<String>,
    pub sesskey: String,
}

/// 解析用到的正则
#[derive(Debug, Clone)]
struct Patterns {
    /// 链接中的 `id=<数字>`（不匹配 `sessid=`）
    link_id: Regex,
    /// 4 位学期代码
    periode: Regex,
    /// 结尾的 `-<字母><数字>` 分组代码
    group: Regex,
    sess_id: Regex,
    sess_key: Regex,
}

impl Patterns {
    fn new() -> Result<Self, ParseError> {
        Ok(Self {
            link_id: pattern("link.id", r"(?:^|[?&;])id=(\d+)")?,
            periode: pattern("courses.periode", r"\b(\d{4})\b")?,
            group: pattern("courses.group", r"-([A-Za-z]\d)\b")?,
            sess_id: pattern("view.sessid", r"sessid=(\d+)")?,
            sess_key: pattern("view.sesskey", r"sesskey=(\w+)")?,
        })
    }
}

fn pattern(name: &'static str, re: &str) -> Result<Regex, ParseError> {
    Regex::new(re).map_err(|source| ParseError::InvalidPattern { name, source })
}

/// 门户页面解析器
///
/// 职责：
/// - 成绩总览页 → `Vec<Course>`
/// - 考勤列表页 → `Vec<AttendanceItem>`
/// - 考勤查看页 → `ViewInfo`
/// - 提交表单页 → `FormInfo`
/// - 状态页 → 是否已签到
/// - 登录页 / 课程页 → 登录状态
#[derive(Debug, Clone)]
pub struct PortalScraper {
    ex: Extractors,
    re: Patterns,
}

impl PortalScraper {
    /// 用指定的页面结构创建解析器
    pub fn new(profile: &MarkupProfile) -> AppResult<Self> {
        Ok(Self {
            ex: Extractors::compile(profile)?,
            re: Patterns::new()?,
        })
    }

    /// 使用当前 Moodle 考勤页面结构
    pub fn moodle() -> AppResult<Self> {
        Self::new(&MOODLE_ATTENDANCE_V1)
    }

    /// 解析成绩总览页中的课程
    ///
    /// 名称、链接、ID、学期、分组缺一不可，否则跳过该行
    pub fn parse_courses(&self, doc: &Html) -> Vec<Course> {
        let mut courses = Vec::new();

        for (row_index, row) in doc.select(&self.ex.course_rows).enumerate() {
            match self.parse_course_row(row) {
                Ok(course) => courses.push(course),
                Err(reason) => {
                    debug!(
                        "[{}] 跳过课程行 #{}: {}",
                        self.ex.version, row_index, reason
                    );
                }
            }
        }

        courses
    }

    fn parse_course_row(&self, row: ElementRef<'_>) -> Result<Course, &'static str> {
        let anchor = row
            .select(&self.ex.course_anchor)
            .next()
            .ok_or("缺少课程链接")?;

        let raw_name = text_of(anchor);
        if raw_name.is_empty() {
            return Err("课程名为空");
        }

        let link = anchor.value().attr("href").unwrap_or_default().trim();
        if link.is_empty() {
            return Err("链接为空");
        }

        let id = self.link_id(link).ok_or("链接中没有数字ID")?;
        let name = self.course_name(&raw_name);
        if name.is_empty() {
            return Err("去掉后缀后课程名为空");
        }

        let periode = self.periode(&raw_name).ok_or("缺少学期代码")?;
        let group = self.group(&raw_name).ok_or("缺少分组代码")?;

        let grade = row
            .select(&self.ex.course_grade)
            .next()
            .and_then(|cell| text_of(cell).parse::<i64>().ok());

        Ok(Course {
            id,
            name,
            link: link.to_string(),
            periode,
            group,
            grade,
        })
    }

    /// 去掉 `(...)` 后缀和 `-A1` 形式的分组后缀
    fn course_name(&self, raw: &str) -> String {
        let head = raw.split(" (").next().unwrap_or_default();
        self.re.group.replace_all(head, "").trim().to_string()
    }

    /// 学期代码优先取括号后缀中的，其次取整串中的第一个
    fn periode(&self, raw: &str) -> Option<String> {
        let suffix = raw.rfind('(').map(|i| &raw[i..]);
        suffix
            .and_then(|s| first_capture(&self.re.periode, s))
            .or_else(|| first_capture(&self.re.periode, raw))
    }

    /// 分组代码取最后一个匹配
    fn group(&self, raw: &str) -> Option<String> {
        self.re
            .group
            .captures_iter(raw)
            .last()
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn link_id(&self, link: &str) -> Option<u64> {
        first_capture(&self.re.link_id, link)
            .and_then(|id| id.parse::<u64>().ok())
            .filter(|id| *id != 0)
    }

    /// 解析课程的考勤列表
    ///
    /// 页面提示"没有考勤"时直接返回空列表
    pub fn parse_attendance_list(&self, doc: &Html, course: &Arc<Course>) -> Vec<AttendanceItem> {
        let notice = doc
            .select(&self.ex.attendance_notice)
            .next()
            .map(text_of)
            .unwrap_or_default();
        if notice == NO_ATTENDANCE_NOTICE {
            debug!("课程 {} 没有考勤", course.name);
            return Vec::new();
        }

        let mut items = Vec::new();
        for (row_index, row) in doc.select(&self.ex.attendance_rows).enumerate() {
            match self.parse_attendance_row(row, course) {
                Ok(item) => items.push(item),
                Err(reason) => {
                    debug!(
                        "[{}] 课程 {} 跳过考勤行 #{}: {}",
                        self.ex.version, course.name, row_index, reason
                    );
                }
            }
        }
        items
    }

    fn parse_attendance_row(
        &self,
        row: ElementRef<'_>,
        course: &Arc<Course>,
    ) -> Result<AttendanceItem, &'static str> {
        let title = row
            .select(&self.ex.attendance_title)
            .next()
            .map(text_of)
            .unwrap_or_default();
        let anchor = row.select(&self.ex.attendance_anchor).next();
        let name = anchor.map(text_of).unwrap_or_default();
        let link = anchor
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default()
            .trim()
            .to_string();

        if title.is_empty() || name.is_empty() || link.is_empty() {
            return Err("标题、名称或链接为空");
        }
        let id = self.link_id(&link).ok_or("链接中没有数字ID")?;

        Ok(AttendanceItem {
            id,
            title,
            name,
            link,
            course: Arc::clone(course),
        })
    }

    /// 解析考勤查看页中的提交链接
    pub fn parse_view_info(&self, doc: &Html) -> AppResult<ViewInfo> {
        const EXTRACTOR: &str = "view.submit_link";

        let submit_link = doc
            .select(&self.ex.view_anchor)
            .filter(|a| text_of(*a).contains(SUBMIT_ANCHOR_TEXT))
            .filter_map(|a| a.value().attr("href"))
            .map(str::trim)
            .find(|href| !href.is_empty())
            .ok_or_else(|| AppError::missing_element(EXTRACTOR))?;

        let session_id = first_capture(&self.re.sess_id, submit_link)
            .ok_or_else(|| AppError::missing_field(EXTRACTOR, "sessid"))?;
        let sess_key = first_capture(&self.re.sess_key, submit_link)
            .ok_or_else(|| AppError::missing_field(EXTRACTOR, "sesskey"))?;

        Ok(ViewInfo {
            session_id,
            sess_key,
            submit_link: submit_link.to_string(),
        })
    }

    /// 读取提交表单中的五个输入框，缺失的为空字符串
    pub fn parse_form_info(&self, doc: &Html) -> FormInfo {
        FormInfo {
            sess_id: input_value(doc, &self.ex.form_sess_id),
            sess_key: input_value(doc, &self.ex.form_sess_key),
            qf_token: input_value(doc, &self.ex.form_qf_token),
            is_expanded: input_value(doc, &self.ex.form_is_expanded),
            status: input_value(doc, &self.ex.form_status),
        }
    }

    /// 状态页中是否有"Self-recorded"单元格
    pub fn is_self_recorded(&self, doc: &Html) -> bool {
        doc.select(&self.ex.status_cell)
            .any(|cell| text_of(cell).contains(SELF_RECORDED_TEXT))
    }

    /// 解析登录页
    pub fn parse_login_page(&self, doc: &Html) -> LoginPage {
        let token = doc
            .select(&self.ex.login_token)
            .next()
            .and_then(|input| input.value().attr("value"))
            .map(str::to_string)
            .filter(|t| !t.is_empty());

        let logout = doc.select(&self.ex.logout_form).next().map(|form| LogoutForm {
            action: form
                .value()
                .attr("action")
                .map(str::to_string)
                .filter(|a| !a.is_empty()),
            sesskey: input_value(doc, &self.ex.logout_sesskey),
        });

        LoginPage { token, logout }
    }

    /// 页面上是否还有登录字段
    pub fn has_login_field(&self, doc: &Html) -> bool {
        doc.select(&self.ex.login_field).next().is_some()
    }
}

/// 元素文本，合并连续空白
fn text_of(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn input_value(doc: &Html, selector: &Selector) -> String {
    doc.select(selector)
        .next()
        .and_then(|input| input.value().attr("value"))
        .unwrap_or_default()
        .to_string()
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper() -> PortalScraper {
        PortalScraper::moodle().unwrap()
    }

    fn overview(rows: &str) -> Html {
        Html::parse_document(&format!(
            r#"<html><body><table id="overview-grade"><tbody>{}</tbody></table></body></html>"#,
            rows
        ))
    }

    fn course() -> Arc<Course> {
        Arc::new(Course {
            id: 555,
            name: "Algoritma".to_string(),
            link: "https://portal.test/course/view.php?id=555".to_string(),
            periode: "2401".to_string(),
            group: "A1".to_string(),
            grade: None,
        })
    }

    #[test]
    fn test_parse_course_without_grade() {
        let doc = overview(
            r#"<tr><td class="cell c0"><a href="view.php?id=555">Algoritma (2401-A1)</a></td></tr>"#,
        );
        let courses = scraper().parse_courses(&doc);
        assert_eq!(
            courses,
            vec![Course {
                id: 555,
                name: "Algoritma".to_string(),
                link: "view.php?id=555".to_string(),
                periode: "2401".to_string(),
                group: "A1".to_string(),
                grade: None,
            }]
        );
    }

    #[test]
    fn test_parse_course_with_grade_and_code_prefix() {
        let doc = overview(
            r#"<tr>
                 <td class="cell c0"><a href="https://portal.test/course/user.php?mode=grade&amp;id=812&amp;user=3">KP0123-2402-B3 Basis Data (2402-B3)</a></td>
                 <td class="cell c1"> 87 </td>
               </tr>"#,
        );
        let courses = scraper().parse_courses(&doc);
        assert_eq!(courses.len(), 1);
        assert_eq!(courses[0].id, 812);
        assert_eq!(courses[0].periode, "2402");
        assert_eq!(courses[0].group, "B3");
        assert_eq!(courses[0].grade, Some(87));
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let doc = overview(
            r#"
            <tr><td class="cell c0"><a href="view.php?id=1">Jaringan Komputer (2401-C2)</a></td></tr>
            <tr><td class="cell c0"><a href="view.php">Tanpa ID (2401-A1)</a></td></tr>
            <tr><td class="cell c0"><a href="view.php?id=3">Tanpa Periode</a></td></tr>
            <tr><td class="cell c0"><a href="view.php?id=4">Tanpa Grup (2401)</a></td></tr>
            <tr><td class="cell c0"><a href="">Tanpa Link (2401-A1)</a></td></tr>
            <tr><td class="cell c0"></td></tr>
            <tr><td class="cell c0"><a href="view.php?id=7">Statistika (2401-D4)</a></td><td class="cell c1">-</td></tr>
            "#,
        );
        let courses = scraper().parse_courses(&doc);
        let ids: Vec<u64> = courses.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 7]);
        assert_eq!(courses[1].grade, None);
    }

    #[test]
    fn test_empty_attendance_notice() {
        let doc = Html::parse_document(
            r#"<div id="notice"> There are no Attendance in this course </div>"#,
        );
        assert!(scraper().parse_attendance_list(&doc, &course()).is_empty());
    }

    #[test]
    fn test_parse_attendance_rows() {
        let doc = Html::parse_document(
            r#"<table class="generaltable"><tbody>
                 <tr><td class="cell c0">Pertemuan 1</td><td class="cell c1"><a href="https://portal.test/mod/attendance/view.php?id=777">Presensi Pertemuan 1</a></td></tr>
                 <tr><td class="cell c0"></td><td class="cell c1"><a href="view.php?id=778">Tanpa Judul</a></td></tr>
                 <tr><td class="cell c0">Pertemuan 3</td><td class="cell c1"><a href="view.php?sessid=9">Tanpa ID</a></td></tr>
               </tbody></table>"#,
        );
        let course = course();
        let items = scraper().parse_attendance_list(&doc, &course);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, 777);
        assert_eq!(items[0].title, "Pertemuan 1");
        assert_eq!(items[0].name, "Presensi Pertemuan 1");
        assert!(Arc::ptr_eq(&items[0].course, &course));
    }

    #[test]
    fn test_parse_view_info() {
        let doc = Html::parse_document(
            r#"<a href="https://portal.test/user/profile.php">Profil</a>
               <a href="https://portal.test/mod/attendance/attendance.php?sessid=4321&amp;sesskey=AbC123xyz">
                 <span>Submit attendance</span>
               </a>"#,
        );
        let scraper = scraper();
        let first = scraper.parse_view_info(&doc).unwrap();
        assert_eq!(first.session_id, "4321");
        assert_eq!(first.sess_key, "AbC123xyz");
        assert_eq!(
            first.submit_link,
            "https://portal.test/mod/attendance/attendance.php?sessid=4321&sesskey=AbC123xyz"
        );

        // 同一文档重复解析结果一致
        let second = scraper.parse_view_info(&doc).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_view_info_missing_anchor_or_key() {
        let scraper = scraper();

        let no_anchor = Html::parse_document(r#"<a href="view.php?id=1">Back</a>"#);
        assert!(matches!(
            scraper.parse_view_info(&no_anchor),
            Err(AppError::Parse(ParseError::MissingElement { .. }))
        ));

        let no_key = Html::parse_document(
            r#"<a href="attendance.php?sessid=4321">Submit attendance</a>"#,
        );
        assert!(matches!(
            scraper.parse_view_info(&no_key),
            Err(AppError::Parse(ParseError::MissingField { field: "sesskey", .. }))
        ));
    }

    #[test]
    fn test_parse_form_info_missing_inputs_are_empty() {
        let doc = Html::parse_document(
            r#"<form>
                 <input type="hidden" name="sessid" value="4321">
                 <input type="hidden" name="sesskey" value="AbC123xyz">
                 <input type="hidden" name="_qf__mod_attendance_form_studentattendance" value="1">
                 <input type="radio" name="status" value="2045">
               </form>"#,
        );
        let form = scraper().parse_form_info(&doc);
        assert_eq!(form.sess_id, "4321");
        assert_eq!(form.sess_key, "AbC123xyz");
        assert_eq!(form.qf_token, "1");
        assert_eq!(form.is_expanded, "");
        assert_eq!(form.status, "2045");
    }

    #[test]
    fn test_self_recorded_status() {
        let scraper = scraper();
        let done = Html::parse_document(
            r#"<table><tr><td>12 Mar 2024</td><td>Self-recorded</td></tr></table>"#,
        );
        let pending = Html::parse_document(
            r#"<table><tr><td>12 Mar 2024</td><td>?</td></tr></table>"#,
        );
        assert!(scraper.is_self_recorded(&done));
        assert!(!scraper.is_self_recorded(&pending));
    }

    #[test]
    fn test_parse_login_page() {
        let scraper = scraper();

        let fresh = Html::parse_document(
            r#"<form action="/login/index.php" method="post">
                 <input id="username" name="username">
                 <input type="hidden" name="logintoken" value="tok123">
               </form>"#,
        );
        let page = scraper.parse_login_page(&fresh);
        assert_eq!(page.token.as_deref(), Some("tok123"));
        assert!(page.logout.is_none());
        assert!(scraper.has_login_field(&fresh));

        let logged_in = Html::parse_document(
            r#"<form action="https://portal.test/login/logout.php" method="post">
                 <input type="hidden" name="sesskey" value="K3y">
               </form>"#,
        );
        let page = scraper.parse_login_page(&logged_in);
        assert!(page.token.is_none());
        let logout = page.logout.unwrap();
        assert_eq!(logout.action.as_deref(), Some("https://portal.test/login/logout.php"));
        assert_eq!(logout.sesskey, "K3y");
        assert!(!scraper.has_login_field(&logged_in));
    }
}
