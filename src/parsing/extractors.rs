use scraper::Selector;

use crate::error::ParseError;
use crate::parsing::profile::MarkupProfile;

/// 编译后的选择器集合
///
/// 每个选择器在构造时编译一次；选择器写错只会让构造失败，并指出是哪一个
#[derive(Debug, Clone)]
pub struct Extractors {
    pub version: &'static str,

    pub login_token: Selector,
    pub logout_form: Selector,
    pub logout_sesskey: Selector,
    pub login_field: Selector,

    pub course_rows: Selector,
    pub course_anchor: Selector,
    pub course_grade: Selector,

    pub attendance_notice: Selector,
    pub attendance_rows: Selector,
    pub attendance_title: Selector,
    pub attendance_anchor: Selector,

    pub view_anchor: Selector,

    pub form_sess_id: Selector,
    pub form_sess_key: Selector,
    pub form_qf_token: Selector,
    pub form_is_expanded: Selector,
    pub form_status: Selector,

    pub status_cell: Selector,
}

impl Extractors {
    /// 编译整张选择器表
    pub fn compile(profile: &MarkupProfile) -> Result<Self, ParseError> {
        Ok(Self {
            version: profile.version,

            login_token: compile("login.token", profile.login_token)?,
            logout_form: compile("login.logout_form", profile.logout_form)?,
            logout_sesskey: compile("login.logout_sesskey", profile.logout_sesskey)?,
            login_field: compile("login.field", profile.login_field)?,

            course_rows: compile("courses.rows", profile.course_rows)?,
            course_anchor: compile("courses.anchor", profile.course_anchor)?,
            course_grade: compile("courses.grade", profile.course_grade)?,

            attendance_notice: compile("attendance.notice", profile.attendance_notice)?,
            attendance_rows: compile("attendance.rows", profile.attendance_rows)?,
            attendance_title: compile("attendance.title", profile.attendance_title)?,
            attendance_anchor: compile("attendance.anchor", profile.attendance_anchor)?,

            view_anchor: compile("view.anchor", profile.view_anchor)?,

            form_sess_id: compile("form.sessid", profile.form_sess_id)?,
            form_sess_key: compile("form.sesskey", profile.form_sess_key)?,
            form_qf_token: compile("form.qf_token", profile.form_qf_token)?,
            form_is_expanded: compile("form.is_expanded", profile.form_is_expanded)?,
            form_status: compile("form.status", profile.form_status)?,

            status_cell: compile("status.cell", profile.status_cell)?,
        })
    }
}

fn compile(name: &'static str, selector: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(selector).map_err(|e| ParseError::InvalidSelector {
        name,
        selector,
        reason: format!("{:?}", e),
    })
}
