//! 会话客户端 - 基础设施层
//!
//! 唯一持有 cookie 的 HTTP 客户端。登录在并发开始前完成，之后各 worker 只读使用同一个会话。
//!
//! - GET：传输层失败（连接 / 超时 / 读取响应体）最多尝试 3 次，退避 500ms → 2s；非 2xx 不重试
//! - POST：不重试，避免重复提交
//! - 每个请求发出前先从共享限流器取令牌

use reqwest::Url;
use scraper::Html;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult, AuthError, NetworkError};
use crate::infrastructure::rate_limiter::RateLimiter;
use crate::parsing::PortalScraper;

/// GET 重试策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub max_attempts: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// 第 `attempt` 次失败后的等待时间（指数退避，有上限）
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as u32;
        self.base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay)
    }
}

/// 客户端参数
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryPolicy,
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
            retry: RetryPolicy::default(),
        }
    }
}

/// 一次请求得到的 HTML 页面
///
/// 只保存文本；`scraper::Html` 不能跨 `.await` 持有，需要时用 [`HtmlPage::parse`] 就地解析
#[derive(Debug, Clone)]
pub struct HtmlPage {
    /// 跟随重定向后的最终地址
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl HtmlPage {
    /// 解析为文档并交给 `f` 处理
    pub fn parse<T>(&self, f: impl FnOnce(&Html) -> T) -> T {
        let doc = Html::parse_document(&self.body);
        f(&doc)
    }
}

/// 会话客户端
pub struct SessionClient {
    http: reqwest::Client,
    limiter: Arc<RateLimiter>,
    retry: RetryPolicy,
}

impl SessionClient {
    /// 创建客户端（带 cookie 存储、超时和固定 User-Agent）
    pub fn new(settings: &ClientSettings, limiter: Arc<RateLimiter>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(settings.timeout)
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|source| NetworkError::ClientInit { source })?;

        Ok(Self {
            http,
            limiter,
            retry: settings.retry,
        })
    }

    /// GET 并返回页面，传输层失败时按策略重试
    pub async fn fetch_document(&self, url: &str) -> AppResult<HtmlPage> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            self.limiter.acquire().await;

            match self.try_get(url).await {
                Ok(page) => {
                    if !(200..300).contains(&page.status) {
                        return Err(NetworkError::UnexpectedStatus {
                            url: url.to_string(),
                            status: page.status,
                        }
                        .into());
                    }
                    return Ok(page);
                }
                Err(e) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay_for(attempt);
                    warn!(
                        "GET {} 失败 (尝试 {}/{}), {:?} 后重试: {}",
                        url, attempt, self.retry.max_attempts, delay, e
                    );
                    sleep(delay).await;
                }
                Err(e) => return Err(AppError::transport(url, attempt, e)),
            }
        }
    }

    async fn try_get(&self, url: &str) -> Result<HtmlPage, reqwest::Error> {
        let response = self.http.get(url).send().await?;
        read_page(response).await
    }

    /// POST 表单，不检查状态码，不重试
    pub async fn post_form(&self, url: &str, fields: &[(&str, String)]) -> AppResult<HtmlPage> {
        self.limiter.acquire().await;

        let response = self
            .http
            .post(url)
            .form(fields)
            .send()
            .await
            .map_err(|e| AppError::transport(url, 1, e))?;

        read_page(response)
            .await
            .map_err(|e| AppError::transport(url, 1, e))
    }

    /// 提交状态变更表单，非 2xx 视为提交失败
    pub async fn submit_form(&self, url: &str, fields: &[(&str, String)]) -> AppResult<HtmlPage> {
        let page = self.post_form(url, fields).await?;
        if !(200..300).contains(&page.status) {
            return Err(AppError::Submit {
                url: url.to_string(),
                status: page.status,
            });
        }
        Ok(page)
    }

    /// 登录并确认会话有效
    ///
    /// # 流程
    /// 1. 获取登录页；若已有会话（存在登出表单）先登出再重新获取
    /// 2. 提取 logintoken
    /// 3. 提交账号、密码、token
    /// 4. 访问课程页，若仍有登录字段则视为失败
    pub async fn authenticate(
        &self,
        login_url: &str,
        courses_url: &str,
        username: &str,
        password: &str,
        scraper: &PortalScraper,
    ) -> AppResult<()> {
        info!("🔐 开始登录");

        let mut page = self.fetch_document(login_url).await?;
        let mut login = page.parse(|doc| scraper.parse_login_page(doc));

        if let Some(logout) = login.logout.take() {
            info!("⚠️ 检测到已有会话，先登出");
            let logout_url = match logout.action.as_deref() {
                Some(action) => resolve_url(login_url, action)?,
                None => resolve_url(login_url, "logout.php")?,
            };
            let fields = [("sesskey", logout.sesskey), ("loginpage", "1".to_string())];
            let response = self.post_form(&logout_url, &fields).await?;
            info!("✓ 登出完成 (状态码 {})，重新获取登录页", response.status);

            page = self.fetch_document(login_url).await?;
            login = page.parse(|doc| scraper.parse_login_page(doc));
        }

        let token = match login.token {
            Some(token) => token,
            None => {
                warn!("⚠️ 登录页缺少 logintoken");
                debug!("登录页片段: {}", snippet(&page.body, 300));
                return Err(AuthError::MissingToken.into());
            }
        };
        debug!("✓ 已获取 logintoken");

        let fields = [
            ("username", username.to_string()),
            ("password", password.to_string()),
            ("logintoken", token),
        ];
        info!("🚀 提交登录表单");
        let response = self.post_form(login_url, &fields).await?;
        info!("登录响应状态码: {}", response.status);

        if !(200..400).contains(&response.status) {
            return Err(AuthError::BadStatus {
                status: response.status,
            }
            .into());
        }

        // 门户不返回明确的登录结果，只能看课程页是否还要求登录
        let courses = self.fetch_document(courses_url).await?;
        if courses.parse(|doc| scraper.has_login_field(doc)) {
            warn!("⚠️ 课程页仍然显示登录字段，登录失败");
            return Err(AuthError::StillUnauthenticated.into());
        }

        info!("✅ 登录成功并已验证");
        Ok(())
    }
}

async fn read_page(response: reqwest::Response) -> Result<HtmlPage, reqwest::Error> {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response.text().await?;
    Ok(HtmlPage { url, status, body })
}

/// 将可能是相对路径的链接解析为绝对地址
pub fn resolve_url(base: &str, link: &str) -> AppResult<String> {
    let base = Url::parse(base).map_err(|e| NetworkError::InvalidUrl {
        url: base.to_string(),
        reason: e.to_string(),
    })?;
    let resolved = base.join(link).map_err(|e| NetworkError::InvalidUrl {
        url: link.to_string(),
        reason: e.to_string(),
    })?;
    Ok(resolved.to_string())
}

/// 截断长文本用于日志显示
fn snippet(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        text.chars().take(max_chars).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
