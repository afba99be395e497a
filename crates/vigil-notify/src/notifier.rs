use crate::message::NotifyMessage;
use anyhow::Result;
use async_trait::async_trait;
use vigil_types::ChannelKind;

/// 通知结果
#[derive(Debug, Clone)]
pub struct NotifyResult {
    pub success: bool,
    pub message: String,
}

impl NotifyResult {
    pub fn success() -> Self {
        Self {
            success: true,
            message: "Notification sent successfully".to_string(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// 通知渠道适配器
///
/// 适配器可以返回 `Err` 或失败的 [`NotifyResult`]，两者都由
/// [`NotifyManager`](crate::NotifyManager) 捕获并记录，不会影响其他渠道。
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送通知
    async fn send(&self, message: &NotifyMessage) -> Result<NotifyResult>;

    /// 通知器名称
    fn name(&self) -> &str;

    /// 渠道类型
    fn kind(&self) -> ChannelKind;

    /// 是否启用
    fn is_enabled(&self) -> bool {
        true
    }
}
