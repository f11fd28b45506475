/// 门户页面结构描述
///
/// 每个字段是一个命名提取器使用的 CSS 选择器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkupProfile {
    /// 结构版本，出现在诊断日志中
    pub version: &'static str,

    // --- 登录页 ---
    pub login_token: &'static str,
    pub logout_form: &'static str,
    pub logout_sesskey: &'static str,
    /// 课程页上出现即表示仍未登录
    pub login_field: &'static str,

    // --- 成绩总览页 ---
    pub course_rows: &'static str,
    pub course_anchor: &'static str,
    pub course_grade: &'static str,

    // --- 考勤列表页 ---
    pub attendance_notice: &'static str,
    pub attendance_rows: &'static str,
    pub attendance_title: &'static str,
    pub attendance_anchor: &'static str,

    // --- 考勤查看页 ---
    pub view_anchor: &'static str,

    // --- 提交表单 ---
    pub form_sess_id: &'static str,
    pub form_sess_key: &'static str,
    pub form_qf_token: &'static str,
    pub form_is_expanded: &'static str,
    pub form_status: &'static str,

    // --- 状态页 ---
    pub status_cell: &'static str,
}

/// Moodle 考勤模块当前使用的页面结构
pub const MOODLE_ATTENDANCE_V1: MarkupProfile = MarkupProfile {
    version: "moodle-attendance-v1",

    login_token: r#"input[name="logintoken"]"#,
    logout_form: r#"form[action*="logout.php"]"#,
    logout_sesskey: r#"input[name="sesskey"]"#,
    login_field: r#"#username, input[name="username"]"#,

    course_rows: "#overview-grade tbody tr",
    course_anchor: "td.cell.c0 a",
    course_grade: "td.cell.c1",

    attendance_notice: "#notice",
    attendance_rows: ".generaltable tbody tr",
    attendance_title: "td.cell.c0",
    attendance_anchor: "td.cell.c1 a",

    view_anchor: "a[href]",

    form_sess_id: r#"input[name="sessid"]"#,
    form_sess_key: r#"input[name="sesskey"]"#,
    form_qf_token: r#"input[name="_qf__mod_attendance_form_studentattendance"]"#,
    form_is_expanded: r#"input[name="mform_isexpanded_id_session"]"#,
    form_status: r#"input[name="status"]"#,

    status_cell: "td",
};

/// 考勤列表页为空时的提示文字
pub const NO_ATTENDANCE_NOTICE: &str = "There are no Attendance in this course";

/// 查看页中提交链接的锚文本
pub const SUBMIT_ANCHOR_TEXT: &str = "Submit attendance";

/// 状态页中表示已自助签到的文字
pub const SELF_RECORDED_TEXT: &str = "Self-recorded";
