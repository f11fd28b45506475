//! 错误类型
//!
//! 按照失败的影响范围划分：
//! - 整次运行级别（致命）：认证、配置、超时、取消
//! - 课程级别：列表页抓取失败，跳过该课程
//! - 条目级别：查看 / 表单 / 提交 / 校验失败，跳过该条目

use std::time::Duration;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 登录相关错误
    #[error("认证错误: {0}")]
    Auth(#[from] AuthError),

    /// 页面结构解析错误
    #[error("解析错误: {0}")]
    Parse(#[from] ParseError),

    /// 查看页与表单页的会话标识不一致
    #[error("会话标识不一致: 查看页 sessid={view_sess_id}, 表单 sessid={form_sess_id}")]
    Mismatch {
        view_sess_id: String,
        form_sess_id: String,
    },

    /// 网络错误（传输失败 / 超时 / 非 2xx 读取）
    #[error("网络错误: {0}")]
    Network(#[from] NetworkError),

    /// 状态变更请求返回了错误状态码
    #[error("提交失败 ({url}): HTTP {status}")]
    Submit { url: String, status: u16 },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 整次运行超出时限
    #[error("运行超时 (时限 {0:?})")]
    Timeout(Duration),

    /// 整次运行被外部取消
    #[error("运行已取消")]
    Cancelled,
}

impl AppError {
    /// 是否应当中止整次运行
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::Auth(_) | AppError::Config(_) | AppError::Timeout(_) | AppError::Cancelled
        )
    }
}

/// 认证错误
#[derive(Debug, Error)]
pub enum AuthError {
    /// 登录页缺少 logintoken
    #[error("登录页缺少 logintoken")]
    MissingToken,

    /// 登录请求返回的状态码不在 200–399 范围内
    #[error("登录请求状态码异常: {status}")]
    BadStatus { status: u16 },

    /// 登录后课程页仍然出现登录字段
    #[error("登录后仍未通过认证")]
    StillUnauthenticated,
}

/// 解析错误
#[derive(Debug, Error)]
pub enum ParseError {
    /// 页面上找不到必需的元素
    #[error("页面缺少必需元素 [{extractor}]")]
    MissingElement { extractor: &'static str },

    /// 元素存在但缺少必需字段
    #[error("[{extractor}] 缺少字段 {field}")]
    MissingField {
        extractor: &'static str,
        field: &'static str,
    },

    /// 选择器无法编译
    #[error("选择器 {name} 无效 ({selector}): {reason}")]
    InvalidSelector {
        name: &'static str,
        selector: &'static str,
        reason: String,
    },

    /// 正则表达式无法编译
    #[error("正则 {name} 无效: {source}")]
    InvalidPattern {
        name: &'static str,
        #[source]
        source: regex::Error,
    },
}

/// 网络错误
#[derive(Debug, Error)]
pub enum NetworkError {
    /// 传输层失败（连接 / 超时 / 读取响应体），已用尽重试
    #[error("请求 {url} 失败 (共尝试 {attempts} 次): {source}")]
    Transport {
        url: String,
        attempts: usize,
        #[source]
        source: reqwest::Error,
    },

    /// 读取请求返回非 2xx 状态码（不重试）
    #[error("请求 {url} 返回状态码 {status}")]
    UnexpectedStatus { url: String, status: u16 },

    /// URL 无法解析
    #[error("无效的 URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// HTTP 客户端初始化失败
    #[error("HTTP 客户端初始化失败: {source}")]
    ClientInit {
        #[source]
        source: reqwest::Error,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },

    /// 必需的配置项缺失
    #[error("配置项 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },

    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 配置文件解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// 调度表达式无效
    #[error("调度表达式 '{spec}' 无效: {reason}")]
    InvalidSchedule { spec: String, reason: String },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建传输层失败错误
    pub fn transport(url: impl Into<String>, attempts: usize, source: reqwest::Error) -> Self {
        AppError::Network(NetworkError::Transport {
            url: url.into(),
            attempts,
            source,
        })
    }

    /// 创建缺少元素的解析错误
    pub fn missing_element(extractor: &'static str) -> Self {
        AppError::Parse(ParseError::MissingElement { extractor })
    }

    /// 创建缺少字段的解析错误
    pub fn missing_field(extractor: &'static str, field: &'static str) -> Self {
        AppError::Parse(ParseError::MissingField { extractor, field })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(AppError::Auth(AuthError::MissingToken).is_fatal());
        assert!(AppError::Timeout(Duration::from_secs(600)).is_fatal());
        assert!(AppError::Cancelled.is_fatal());

        assert!(!AppError::missing_element("view.submit_link").is_fatal());
        assert!(!AppError::Submit {
            url: "https://portal.test/form.php".to_string(),
            status: 500,
        }
        .is_fatal());
        assert!(!AppError::Mismatch {
            view_sess_id: "1".to_string(),
            form_sess_id: "2".to_string(),
        }
        .is_fatal());
    }

    #[test]
    fn test_display_names_extractor() {
        let err = AppError::missing_field("view.submit_link", "sesskey");
        let text = err.to_string();
        assert!(text.contains("view.submit_link"));
        assert!(text.contains("sesskey"));
    }
}
