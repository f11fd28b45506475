//! 通知服务 - 业务能力层
//!
//! 只负责"把完成事件发出去"，不关心流程。
//! 每条消息一个后台任务，调用方从不等待；`drain()` 等待所有未完成的发送。

use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppResult, NetworkError};
use crate::models::{CompletionEvent, GroupMessage};

/// 完成事件的接收方
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// 发布事件，不阻塞调用方
    fn publish(&self, event: CompletionEvent);

    /// 等待所有已发布事件处理完毕，返回处理的消息数
    async fn drain(&self) -> usize {
        0
    }
}

/// 未配置通知时使用
#[derive(Debug, Default)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    fn publish(&self, event: CompletionEvent) {
        debug!("通知未启用，忽略事件: {} / {}", event.course_name, event.item_name);
    }
}

/// Webhook 通知
///
/// 每个事件发两条消息：一条给自己，一条给群组
pub struct WebhookNotifier {
    http: reqwest::Client,
    endpoint: String,
    token: String,
    me: String,
    group: String,
    pending: Mutex<JoinSet<()>>,
}

impl WebhookNotifier {
    pub fn new(config: &Config) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|source| NetworkError::ClientInit { source })?;

        Ok(Self {
            http,
            endpoint: config.notify_endpoint.clone(),
            token: config.notify_token.clone(),
            me: config.notify_me.clone(),
            group: config.notify_group.clone(),
            pending: Mutex::new(JoinSet::new()),
        })
    }

    /// 事件对应的消息，未配置的接收方会被跳过
    pub fn messages_for(&self, event: &CompletionEvent) -> Vec<GroupMessage> {
        let at = event.timestamp();
        let mut messages = Vec::with_capacity(2);

        if !self.me.is_empty() {
            messages.push(GroupMessage {
                message: format!(
                    "✅ Presensi berhasil!\n\nMata kuliah: {}\nPresensi: {}\nWaktu: {}",
                    event.course_name, event.item_name, at
                ),
                group_id: self.me.clone(),
            });
        }
        if !self.group.is_empty() {
            messages.push(GroupMessage {
                message: format!(
                    "🤖 Presensi otomatis\n\nMata kuliah: {}\nPresensi: {}\nWaktu: {}",
                    event.course_name, event.item_name, at
                ),
                group_id: self.group.clone(),
            });
        }
        messages
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    fn publish(&self, event: CompletionEvent) {
        let messages = self.messages_for(&event);
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        for message in messages {
            let http = self.http.clone();
            let endpoint = self.endpoint.clone();
            let token = self.token.clone();

            pending.spawn(async move {
                let result = http
                    .post(&endpoint)
                    .header("Authorization", token)
                    .json(&message)
                    .send()
                    .await;

                match result {
                    Ok(response) if response.status().is_success() => {
                        info!("📨 通知已发送到 {}", message.group_id);
                    }
                    Ok(response) => {
                        warn!("通知发送到 {} 失败: HTTP {}", message.group_id, response.status());
                    }
                    Err(e) => {
                        warn!("通知发送到 {} 失败: {}", message.group_id, e);
                    }
                }
            });
        }
    }

    async fn drain(&self) -> usize {
        let mut pending = {
            let mut guard = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *guard)
        };

        let mut finished = 0;
        while let Some(result) = pending.join_next().await {
            if let Err(e) = result {
                warn!("通知任务异常结束: {}", e);
            }
            finished += 1;
        }
        if finished > 0 {
            debug!("所有通知任务已完成 ({} 条)", finished);
        }
        finished
    }
}
