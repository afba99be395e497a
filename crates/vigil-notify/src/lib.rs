pub mod channel;
pub mod manager;
pub mod message;
pub mod notifier;
pub mod providers;

pub use channel::{build_notifier, ChannelConfig, ChannelSettings};
pub use manager::{ChannelOutcome, DeliveryStatus, DispatchReport, NotifyManager};
pub use message::{NotifyKind, NotifyMessage};
pub use notifier::{Notifier, NotifyResult};
pub use providers::{
    ChatConfig, ChatNotifier, EmailConfig, EmailNotifier, PagerConfig, PagerNotifier, SmsConfig,
    SmsNotifier, WebhookConfig, WebhookNotifier,
};
