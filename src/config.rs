use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// 指向 TOML 配置文件的环境变量
pub const CONFIG_PATH_VAR: &str = "ATTENDANCE_CONFIG";

/// 程序配置
///
/// 在 `main` 中构建一次，之后以引用方式传给各组件的构造函数
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- 账号 ---
    pub username: String,
    pub password: String,
    // --- 门户地址 ---
    pub login_url: String,
    pub courses_url: String,
    pub attendance_list_url: String,
    pub attendance_url: String,
    pub attendance_form_url: String,
    /// 只处理该学期的课程（为空则不过滤）
    pub current_periode: String,
    // --- 并发与限流 ---
    /// 配置的并发数
    pub concurrency: usize,
    /// 并发下限，实际 worker 数为两者较大值
    pub concurrency_floor: usize,
    /// 令牌桶每秒补充的令牌数
    pub rate_per_sec: f64,
    /// 令牌桶容量
    pub rate_burst: u32,
    /// 单个请求超时（秒）
    pub request_timeout_secs: i64,
    /// 整次运行时限（秒）
    pub run_timeout_secs: u64,
    /// 只读演练，不发出提交请求
    pub dry_run: bool,
    pub user_agent: String,
    // --- 调度 ---
    pub cron_weekday: String,
    pub cron_weekend: String,
    /// 调度所用时区相对 UTC 的小时偏移
    pub utc_offset_hours: i32,
    // --- 通知 ---
    pub notify_endpoint: String,
    pub notify_token: String,
    pub notify_me: String,
    pub notify_group: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            username: String::new(),
            password: String::new(),
            login_url: String::new(),
            courses_url: String::new(),
            attendance_list_url: String::new(),
            attendance_url: String::new(),
            attendance_form_url: String::new(),
            current_periode: String::new(),
            concurrency: 4,
            concurrency_floor: 5,
            rate_per_sec: 1.0,
            rate_burst: 2,
            request_timeout_secs: 15,
            run_timeout_secs: 600,
            dry_run: false,
            user_agent: "Mozilla/5.0".to_string(),
            cron_weekday: "1 8,12,13,14,19 * * 1-5".to_string(),
            cron_weekend: "0 8,9,11,14,16 * * 6".to_string(),
            utc_offset_hours: 7,
            notify_endpoint: String::new(),
            notify_token: String::new(),
            notify_me: String::new(),
            notify_group: String::new(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：默认值 → TOML 文件（可选）→ 环境变量
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.is_empty() => Self::from_toml_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    fn from_toml_str(content: &str, origin: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::TomlParseFailed {
            path: origin.to_string(),
            source,
        })
    }

    /// 用环境变量覆盖已有配置
    ///
    /// `lookup` 返回变量值；未设置的变量保持原值
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |target: &mut String, name: &str| {
            if let Some(value) = lookup(name) {
                *target = value;
            }
        };
        text(&mut self.username, "USERNAME");
        text(&mut self.password, "PASSWORD");
        text(&mut self.login_url, "LOGIN_URL");
        text(&mut self.courses_url, "COURSES_URL");
        text(&mut self.attendance_list_url, "ATTENDANCE_LIST_URL");
        text(&mut self.attendance_url, "ATTENDANCE_URL");
        text(&mut self.attendance_form_url, "ATTENDANCE_FORM_URL");
        text(&mut self.current_periode, "CURRENT_PERIODE");
        text(&mut self.user_agent, "USER_AGENT");
        text(&mut self.cron_weekday, "CRON_WEEKDAY");
        text(&mut self.cron_weekend, "CRON_WEEKEND");
        text(&mut self.notify_endpoint, "NOTIFY_ENDPOINT");
        text(&mut self.notify_token, "NOTIFY_TOKEN");
        text(&mut self.notify_me, "NOTIFY_ME");
        text(&mut self.notify_group, "NOTIFY_GROUP");

        parse_var(&lookup, "CONCURRENCY", "usize", &mut self.concurrency)?;
        parse_var(&lookup, "CONCURRENCY_FLOOR", "usize", &mut self.concurrency_floor)?;
        parse_var(&lookup, "RATE_PER_SEC", "f64", &mut self.rate_per_sec)?;
        parse_var(&lookup, "RATE_BURST", "u32", &mut self.rate_burst)?;
        parse_var(&lookup, "REQUEST_TIMEOUT_SEC", "i64", &mut self.request_timeout_secs)?;
        parse_var(&lookup, "RUN_TIMEOUT_SEC", "u64", &mut self.run_timeout_secs)?;
        parse_var(&lookup, "DRY_RUN", "bool", &mut self.dry_run)?;
        parse_var(&lookup, "UTC_OFFSET_HOURS", "i32", &mut self.utc_offset_hours)?;
        parse_var(&lookup, "VERBOSE_LOGGING", "bool", &mut self.verbose_logging)?;
        Ok(())
    }

    /// 检查必需配置项
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("USERNAME", &self.username),
            ("PASSWORD", &self.password),
            ("LOGIN_URL", &self.login_url),
            ("COURSES_URL", &self.courses_url),
            ("ATTENDANCE_LIST_URL", &self.attendance_list_url),
            ("ATTENDANCE_URL", &self.attendance_url),
            ("ATTENDANCE_FORM_URL", &self.attendance_form_url),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::EnvVarNotFound {
                    var_name: name.to_string(),
                });
            }
        }
        Ok(())
    }

    /// 单个请求超时，非正数时回退到 15 秒
    pub fn request_timeout(&self) -> Duration {
        if self.request_timeout_secs <= 0 {
            Duration::from_secs(15)
        } else {
            Duration::from_secs(self.request_timeout_secs as u64)
        }
    }

    /// 整次运行时限
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs.max(1))
    }

    /// 实际 worker 数
    pub fn worker_count(&self) -> usize {
        self.concurrency_floor.max(self.concurrency).max(1)
    }

    /// 是否配置了通知地址
    pub fn notifications_enabled(&self) -> bool {
        !self.notify_endpoint.trim().is_empty()
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, expected_type: &str, target: &mut T) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(name) else {
        return Ok(());
    };
    let value = raw.trim();
    if value.is_empty() {
        return Ok(());
    }
    *target = value.parse().map_err(|_| ConfigError::EnvVarParseFailed {
        var_name: name.to_string(),
        value: value.to_string(),
        expected_type: expected_type.to_string(),
    })?;
    Ok(())
}
