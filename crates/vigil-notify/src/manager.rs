use crate::message::NotifyMessage;
use crate::notifier::Notifier;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use vigil_types::ChannelKind;

/// 单个渠道的投递状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Delivered,
    Failed(String),
    TimedOut,
}

/// 单个渠道的投递结果
#[derive(Debug, Clone)]
pub struct ChannelOutcome {
    pub channel: String,
    pub kind: ChannelKind,
    pub status: DeliveryStatus,
}

impl ChannelOutcome {
    pub fn is_delivered(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }
}

/// 一次分发的汇总结果
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
}

impl DispatchReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_delivered()).count()
    }

    pub fn failures(&self) -> Vec<&ChannelOutcome> {
        self.outcomes.iter().filter(|o| !o.is_delivered()).collect()
    }

    pub fn all_delivered(&self) -> bool {
        self.outcomes.iter().all(|o| o.is_delivered())
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// 通知管理器
///
/// 把一条消息并发分发到所有启用的渠道：每个渠道一个独立任务，
/// 全部结束（或超时）后才返回。单个渠道的错误、超时甚至 panic
/// 只会体现在它自己的 [`ChannelOutcome`] 中。分发内部不做重试。
pub struct NotifyManager {
    /// 通知器列表
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,

    /// 单渠道发送超时
    send_timeout: Duration,
}

impl NotifyManager {
    pub fn new(send_timeout: Duration) -> Self {
        Self {
            notifiers: RwLock::new(Vec::new()),
            send_timeout,
        }
    }

    /// 注册通知器
    pub async fn register(&self, notifier: Arc<dyn Notifier>) {
        info!(
            channel = notifier.name(),
            kind = %notifier.kind(),
            enabled = notifier.is_enabled(),
            "Registered notifier"
        );
        self.notifiers.write().await.push(notifier);
    }

    pub async fn notifier_count(&self) -> usize {
        self.notifiers.read().await.len()
    }

    /// 发送通知到所有启用的渠道
    pub async fn dispatch(&self, message: &NotifyMessage) -> DispatchReport {
        let targets: Vec<_> = {
            let notifiers = self.notifiers.read().await;
            notifiers.iter().filter(|n| n.is_enabled()).cloned().collect()
        };
        self.fan_out(targets, message).await
    }

    /// 只发送到指定类型的启用渠道（升级通知使用）
    pub async fn dispatch_to(&self, kinds: &[ChannelKind], message: &NotifyMessage) -> DispatchReport {
        let targets: Vec<_> = {
            let notifiers = self.notifiers.read().await;
            notifiers
                .iter()
                .filter(|n| n.is_enabled() && kinds.contains(&n.kind()))
                .cloned()
                .collect()
        };
        self.fan_out(targets, message).await
    }

    async fn fan_out(&self, targets: Vec<Arc<dyn Notifier>>, message: &NotifyMessage) -> DispatchReport {
        if targets.is_empty() {
            debug!(title = %message.title, "No enabled channels for notification");
            return DispatchReport::default();
        }

        let message = Arc::new(message.clone());
        let send_timeout = self.send_timeout;

        let tasks = targets.into_iter().map(|notifier| {
            let channel = notifier.name().to_string();
            let kind = notifier.kind();
            let message = message.clone();

            let handle = tokio::spawn(async move {
                match tokio::time::timeout(send_timeout, notifier.send(&message)).await {
                    Ok(Ok(result)) if result.success => DeliveryStatus::Delivered,
                    Ok(Ok(result)) => DeliveryStatus::Failed(result.message),
                    Ok(Err(e)) => DeliveryStatus::Failed(e.to_string()),
                    Err(_) => DeliveryStatus::TimedOut,
                }
            });

            async move {
                let status = match handle.await {
                    Ok(status) => status,
                    Err(e) => DeliveryStatus::Failed(format!("channel task aborted: {}", e)),
                };
                ChannelOutcome {
                    channel,
                    kind,
                    status,
                }
            }
        });

        let outcomes = join_all(tasks).await;

        for outcome in &outcomes {
            match &outcome.status {
                DeliveryStatus::Delivered => {
                    info!(channel = %outcome.channel, title = %message.title, "Notification sent");
                }
                DeliveryStatus::Failed(reason) => {
                    error!(channel = %outcome.channel, title = %message.title, error = %reason, "Notification failed");
                }
                DeliveryStatus::TimedOut => {
                    warn!(channel = %outcome.channel, title = %message.title, timeout = ?send_timeout, "Notification timed out");
                }
            }
        }

        DispatchReport { outcomes }
    }
}

impl Default for NotifyManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::NotifyResult;
    use anyhow::Result;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vigil_types::{Alert, RuleKind, Severity};

    enum Behaviour {
        Ok,
        Err,
        Reject,
        Panic,
        Hang,
    }

    struct MockNotifier {
        name: String,
        kind: ChannelKind,
        behaviour: Behaviour,
        enabled: bool,
        calls: Arc<AtomicUsize>,
    }

    impl MockNotifier {
        fn new(name: &str, kind: ChannelKind, behaviour: Behaviour) -> (Arc<Self>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let notifier = Arc::new(Self {
                name: name.to_string(),
                kind,
                behaviour,
                enabled: true,
                calls: calls.clone(),
            });
            (notifier, calls)
        }
    }

    #[async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _message: &NotifyMessage) -> Result<NotifyResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Ok => Ok(NotifyResult::success()),
                Behaviour::Err => Err(anyhow::anyhow!("connection refused")),
                Behaviour::Reject => Ok(NotifyResult::failure("HTTP 500")),
                Behaviour::Panic => panic!("adapter bug"),
                Behaviour::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok(NotifyResult::success())
                }
            }
        }

        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> ChannelKind {
            self.kind
        }

        fn is_enabled(&self) -> bool {
            self.enabled
        }
    }

    fn message() -> NotifyMessage {
        let alert = Alert::new(
            "cpu-high",
            "CPU High",
            RuleKind::Performance,
            "cpu",
            93.0,
            80.0,
            Severity::High,
            "cpu is 93.00 (gt 80.00)",
            Utc::now(),
        );
        NotifyMessage::triggered(&alert)
    }

    #[tokio::test]
    async fn test_one_failing_channel_does_not_block_others() {
        let manager = NotifyManager::new(Duration::from_secs(1));
        let (mail, mail_calls) = MockNotifier::new("mail", ChannelKind::Email, Behaviour::Ok);
        let (chat, chat_calls) = MockNotifier::new("chat", ChannelKind::Chat, Behaviour::Err);
        let (hook, hook_calls) = MockNotifier::new("hook", ChannelKind::Webhook, Behaviour::Ok);
        manager.register(mail).await;
        manager.register(chat).await;
        manager.register(hook).await;

        let report = manager.dispatch(&message()).await;

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.delivered(), 2);
        assert_eq!(mail_calls.load(Ordering::SeqCst), 1);
        assert_eq!(chat_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);

        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].channel, "chat");
    }

    #[tokio::test]
    async fn test_panic_and_rejection_are_contained() {
        let manager = NotifyManager::new(Duration::from_secs(1));
        let (bad, _) = MockNotifier::new("bad", ChannelKind::Sms, Behaviour::Panic);
        let (rejecting, _) = MockNotifier::new("rejecting", ChannelKind::Webhook, Behaviour::Reject);
        let (good, good_calls) = MockNotifier::new("good", ChannelKind::Email, Behaviour::Ok);
        manager.register(bad).await;
        manager.register(rejecting).await;
        manager.register(good).await;

        let report = manager.dispatch(&message()).await;

        assert_eq!(report.delivered(), 1);
        assert_eq!(good_calls.load(Ordering::SeqCst), 1);
        assert!(matches!(report.outcomes[1].status, DeliveryStatus::Failed(ref m) if m == "HTTP 500"));
    }

    #[tokio::test]
    async fn test_slow_channel_times_out() {
        let manager = NotifyManager::new(Duration::from_millis(50));
        let (slow, _) = MockNotifier::new("slow", ChannelKind::Pager, Behaviour::Hang);
        let (fast, _) = MockNotifier::new("fast", ChannelKind::Chat, Behaviour::Ok);
        manager.register(slow).await;
        manager.register(fast).await;

        let report = manager.dispatch(&message()).await;

        assert_eq!(report.outcomes[0].status, DeliveryStatus::TimedOut);
        assert!(report.outcomes[1].is_delivered());
    }

    #[tokio::test]
    async fn test_disabled_channels_and_kind_filter() {
        let manager = NotifyManager::default();
        let calls = Arc::new(AtomicUsize::new(0));
        manager
            .register(Arc::new(MockNotifier {
                name: "muted".to_string(),
                kind: ChannelKind::Email,
                behaviour: Behaviour::Ok,
                enabled: false,
                calls: calls.clone(),
            }))
            .await;
        let (pager, pager_calls) = MockNotifier::new("pager", ChannelKind::Pager, Behaviour::Ok);
        let (chat, chat_calls) = MockNotifier::new("chat", ChannelKind::Chat, Behaviour::Ok);
        manager.register(pager).await;
        manager.register(chat).await;

        let report = manager.dispatch_to(&[ChannelKind::Pager, ChannelKind::Email], &message()).await;

        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].channel, "pager");
        assert_eq!(pager_calls.load(Ordering::SeqCst), 1);
        assert_eq!(chat_calls.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_dispatch() {
        let manager = NotifyManager::default();
        let report = tokio_test::block_on(manager.dispatch(&message()));
        assert!(report.is_empty());
        assert!(report.all_delivered());
    }
}
