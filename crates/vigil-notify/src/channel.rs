use crate::notifier::Notifier;
use crate::providers::{
    default_enabled, ChatConfig, ChatNotifier, EmailConfig, EmailNotifier, PagerConfig,
    PagerNotifier, SmsConfig, SmsNotifier, WebhookConfig, WebhookNotifier,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use vigil_types::ChannelKind;

/// 渠道提供方配置，按 `type` 字段区分
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelSettings {
    Email(EmailConfig),
    Chat(ChatConfig),
    Pager(PagerConfig),
    Webhook(WebhookConfig),
    Sms(SmsConfig),
}

/// 通知渠道配置
///
/// ```toml
/// [[channels]]
/// name = "oncall-pager"
/// type = "pager"
/// routing_key = "..."
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub name: String,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(flatten)]
    pub settings: ChannelSettings,
}

impl ChannelConfig {
    pub fn kind(&self) -> ChannelKind {
        match self.settings {
            ChannelSettings::Email(_) => ChannelKind::Email,
            ChannelSettings::Chat(_) => ChannelKind::Chat,
            ChannelSettings::Pager(_) => ChannelKind::Pager,
            ChannelSettings::Webhook(_) => ChannelKind::Webhook,
            ChannelSettings::Sms(_) => ChannelKind::Sms,
        }
    }
}

/// 根据配置构建通知器
pub fn build_notifier(config: &ChannelConfig) -> Arc<dyn Notifier> {
    let name = config.name.clone();
    let enabled = config.enabled;
    match &config.settings {
        ChannelSettings::Email(c) => Arc::new(EmailNotifier::new(c.clone()).named(name).enabled(enabled)),
        ChannelSettings::Chat(c) => Arc::new(ChatNotifier::new(c.clone()).named(name).enabled(enabled)),
        ChannelSettings::Pager(c) => Arc::new(PagerNotifier::new(c.clone()).named(name).enabled(enabled)),
        ChannelSettings::Webhook(c) => {
            Arc::new(WebhookNotifier::new(c.clone()).named(name).enabled(enabled))
        }
        ChannelSettings::Sms(c) => Arc::new(SmsNotifier::new(c.clone()).named(name).enabled(enabled)),
    }
}
