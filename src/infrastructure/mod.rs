//! 基础设施层
//!
//! 持有稀缺资源（cookie 会话、限流令牌），只暴露能力，不认识考勤流程。

pub mod rate_limiter;
pub mod session_client;

pub use rate_limiter::RateLimiter;
pub use session_client::{resolve_url, ClientSettings, HtmlPage, RetryPolicy, SessionClient};
