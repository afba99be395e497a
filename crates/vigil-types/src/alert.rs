use crate::severity::Severity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 触发时刻周边指标快照
pub type AlertContext = BTreeMap<String, serde_json::Value>;

/// 规则类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Performance,
    Business,
}

impl RuleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleKind::Performance => "performance",
            RuleKind::Business => "business",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 告警实例
///
/// 每次触发生成一个新的 `id`，同一规则可以同时存在多个告警实例。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub rule_name: String,
    pub rule_kind: RuleKind,
    pub metric: String,
    pub current_value: f64,
    pub threshold: f64,
    pub severity: Severity,
    pub message: String,
    pub triggered_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,

    /// 持续时间（分钟），在解决时写入
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,

    #[serde(default)]
    pub context: AlertContext,
}

impl Alert {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rule_id: impl Into<String>,
        rule_name: impl Into<String>,
        rule_kind: RuleKind,
        metric: impl Into<String>,
        current_value: f64,
        threshold: f64,
        severity: Severity,
        message: impl Into<String>,
        triggered_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            rule_id: rule_id.into(),
            rule_name: rule_name.into(),
            rule_kind,
            metric: metric.into(),
            current_value,
            threshold,
            severity,
            message: message.into(),
            triggered_at,
            resolved_at: None,
            duration_minutes: None,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            context: AlertContext::new(),
        }
    }

    pub fn with_context(mut self, context: AlertContext) -> Self {
        self.context = context;
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved_at.is_some()
    }

    pub fn is_acknowledged(&self) -> bool {
        self.acknowledged_at.is_some()
    }

    /// 标记确认，重复确认保留首次确认人
    pub fn acknowledge(&mut self, by: impl Into<String>, at: DateTime<Utc>) {
        if self.acknowledged_at.is_none() {
            self.acknowledged_by = Some(by.into());
            self.acknowledged_at = Some(at);
        }
    }

    /// 标记解决并计算持续时间；解决人同时视为确认人
    pub fn resolve(&mut self, by: Option<String>, at: DateTime<Utc>) {
        if let Some(by) = &by {
            self.acknowledge(by.clone(), at);
        }
        self.resolved_by = by;
        self.resolved_at = Some(at);
        self.duration_minutes = Some((at - self.triggered_at).num_minutes());
    }

    /// 通知标题
    pub fn title(&self) -> String {
        if self.is_resolved() {
            format!("[RESOLVED] {}", self.rule_name)
        } else {
            self.rule_name.clone()
        }
    }
}
