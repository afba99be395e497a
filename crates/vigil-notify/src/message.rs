use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_types::{Alert, Severity};

/// 通知类型
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifyKind {
    /// 告警触发
    Triggered,
    /// 告警解决
    Resolved,
    /// 升级通知（level 从 0 开始）
    Escalation { level: usize },
}

/// 通知消息
///
/// 每个渠道适配器都能拿到完整的 [`Alert`]，消息格式由适配器自行决定。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMessage {
    /// 标题
    pub title: String,

    /// 内容
    pub content: String,

    pub kind: NotifyKind,

    pub severity: Severity,

    /// 时间
    pub timestamp: DateTime<Utc>,

    pub alert: Alert,

    /// 额外接收人（升级策略指定）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recipients: Vec<String>,
}

impl NotifyMessage {
    pub fn triggered(alert: &Alert) -> Self {
        Self {
            title: alert.title(),
            content: alert.message.clone(),
            kind: NotifyKind::Triggered,
            severity: alert.severity,
            timestamp: alert.triggered_at,
            alert: alert.clone(),
            recipients: Vec::new(),
        }
    }

    pub fn resolved(alert: &Alert) -> Self {
        let by = alert.resolved_by.as_deref().unwrap_or("system");
        let duration = alert.duration_minutes.unwrap_or_default();
        Self {
            title: format!("[RESOLVED] {}", alert.rule_name),
            content: format!(
                "{} (resolved by {} after {} min)",
                alert.message, by, duration
            ),
            kind: NotifyKind::Resolved,
            severity: alert.severity,
            timestamp: alert.resolved_at.unwrap_or_else(Utc::now),
            alert: alert.clone(),
            recipients: Vec::new(),
        }
    }

    pub fn escalation(alert: &Alert, level: usize, recipients: Vec<String>, at: DateTime<Utc>) -> Self {
        Self {
            title: format!("[ESCALATION L{}] {}", level + 1, alert.rule_name),
            content: format!(
                "{} (unacknowledged since {})",
                alert.message,
                alert.triggered_at.to_rfc3339()
            ),
            kind: NotifyKind::Escalation { level },
            severity: alert.severity,
            timestamp: at,
            alert: alert.clone(),
            recipients,
        }
    }

    pub fn is_resolution(&self) -> bool {
        self.kind == NotifyKind::Resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_types::RuleKind;

    fn alert() -> Alert {
        Alert::new(
            "mrr-drop",
            "MRR Drop",
            RuleKind::Business,
            "revenue.monthlyRecurringRevenue",
            8800.0,
            -10.0,
            Severity::High,
            "revenue.monthlyRecurringRevenue changed by -12.0%",
            Utc::now(),
        )
    }

    #[test]
    fn test_resolved_title_is_prefixed() {
        let mut alert = alert();
        alert.resolve(Some("alice".to_string()), Utc::now());
        let message = NotifyMessage::resolved(&alert);
        assert_eq!(message.title, "[RESOLVED] MRR Drop");
        assert!(message.is_resolution());
        assert!(message.content.contains("alice"));
    }

    #[test]
    fn test_escalation_carries_recipients() {
        let message = NotifyMessage::escalation(&alert(), 1, vec!["cto@example.com".into()], Utc::now());
        assert_eq!(message.kind, NotifyKind::Escalation { level: 1 });
        assert_eq!(message.title, "[ESCALATION L2] MRR Drop");
        assert_eq!(message.recipients.len(), 1);
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_value(NotifyKind::Escalation { level: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({ "type": "escalation", "level": 2 }));
    }
}
