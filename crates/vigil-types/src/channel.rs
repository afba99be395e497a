use serde::{Deserialize, Serialize};
use std::fmt;

/// 通知渠道类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// 邮件
    Email,
    /// 聊天机器人 Webhook（Slack 风格）
    Chat,
    /// 值班呼叫（PagerDuty 风格）
    Pager,
    /// 通用 Webhook
    Webhook,
    /// 短信
    Sms,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Chat => "chat",
            ChannelKind::Pager => "pager",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Sms => "sms",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
