use crate::baseline::BaselineTracker;
use crate::error::{AlertError, Result};
use crate::snapshot::{BusinessSnapshot, PerformanceSnapshot};
use serde::{Deserialize, Serialize};
use std::fmt;
use vigil_types::{AlertContext, RuleKind, Severity};

/// 性能指标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PerformanceMetric {
    ResponseTime,
    ErrorRate,
    Throughput,
    Cpu,
    Memory,
    Disk,
    Network,
}

impl PerformanceMetric {
    pub const ALL: [PerformanceMetric; 7] = [
        PerformanceMetric::ResponseTime,
        PerformanceMetric::ErrorRate,
        PerformanceMetric::Throughput,
        PerformanceMetric::Cpu,
        PerformanceMetric::Memory,
        PerformanceMetric::Disk,
        PerformanceMetric::Network,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PerformanceMetric::ResponseTime => "response_time",
            PerformanceMetric::ErrorRate => "error_rate",
            PerformanceMetric::Throughput => "throughput",
            PerformanceMetric::Cpu => "cpu",
            PerformanceMetric::Memory => "memory",
            PerformanceMetric::Disk => "disk",
            PerformanceMetric::Network => "network",
        }
    }

    /// 以百分比表示的指标，阈值必须落在 [0, 100]
    pub fn is_percentage(&self) -> bool {
        matches!(
            self,
            PerformanceMetric::ErrorRate
                | PerformanceMetric::Cpu
                | PerformanceMetric::Memory
                | PerformanceMetric::Disk
        )
    }
}

impl fmt::Display for PerformanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 判断条件
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Gt,
    Lt,
    Eq,
    Ne,
    /// 相对基线的百分比变化，仅业务规则可用
    PctChange,
}

impl Condition {
    /// 简单比较；`PctChange` 需要基线，返回 `None`
    pub fn compare(&self, value: f64, threshold: f64) -> Option<bool> {
        match self {
            Condition::Gt => Some(value > threshold),
            Condition::Lt => Some(value < threshold),
            Condition::Eq => Some((value - threshold).abs() < f64::EPSILON),
            Condition::Ne => Some((value - threshold).abs() >= f64::EPSILON),
            Condition::PctChange => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Gt => "gt",
            Condition::Lt => "lt",
            Condition::Eq => "eq",
            Condition::Ne => "ne",
            Condition::PctChange => "pct_change",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 基线对比周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonPeriod {
    Hour,
    Day,
    Week,
    Month,
}

impl ComparisonPeriod {
    /// 该周期对应的样本数 k，按求值周期计数（每个周期记录一个样本）
    pub fn sample_count(&self) -> usize {
        match self {
            ComparisonPeriod::Hour => 1,
            ComparisonPeriod::Day => 24,
            ComparisonPeriod::Week => 168,
            ComparisonPeriod::Month => 720,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ComparisonPeriod::Hour => "hour",
            ComparisonPeriod::Day => "day",
            ComparisonPeriod::Week => "week",
            ComparisonPeriod::Month => "month",
        }
    }
}

/// 性能规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRule {
    pub id: String,
    pub name: String,
    pub metric: PerformanceMetric,
    pub condition: Condition,
    pub threshold: f64,

    /// 条件需要持续满足的分钟数，0 表示立即触发
    #[serde(default)]
    pub sustained_duration_minutes: u32,

    pub severity: Severity,

    #[serde(default)]
    pub cooldown_minutes: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// 业务规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessRule {
    pub id: String,
    pub name: String,

    /// 点分路径
    pub metric: String,

    pub condition: Condition,
    pub threshold: f64,

    #[serde(default = "default_period")]
    pub comparison_period: ComparisonPeriod,

    pub severity: Severity,

    #[serde(default)]
    pub cooldown_minutes: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_period() -> ComparisonPeriod {
    ComparisonPeriod::Day
}

/// 规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Rule {
    Performance(PerformanceRule),
    Business(BusinessRule),
}

impl Rule {
    pub fn as_alert_rule(&self) -> &dyn AlertRule {
        match self {
            Rule::Performance(r) => r,
            Rule::Business(r) => r,
        }
    }

    pub fn id(&self) -> &str {
        self.as_alert_rule().id()
    }

    pub fn kind(&self) -> RuleKind {
        self.as_alert_rule().kind()
    }

    pub fn is_enabled(&self) -> bool {
        self.as_alert_rule().is_enabled()
    }

    /// 冷却表键：规则类型 + 规则 ID
    pub fn cooldown_key(&self) -> String {
        format!("{}:{}", self.kind(), self.id())
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Rule::Performance(r) => r.validate(),
            Rule::Business(r) => r.validate(),
        }
    }

    /// 应用部分更新，返回新的规则（不修改自身）
    pub fn patched(&self, patch: &RulePatch) -> Rule {
        let mut rule = self.clone();
        match &mut rule {
            Rule::Performance(r) => {
                apply_common(
                    patch,
                    &mut r.name,
                    &mut r.condition,
                    &mut r.threshold,
                    &mut r.severity,
                    &mut r.cooldown_minutes,
                    &mut r.enabled,
                );
                if let Some(sustained) = patch.sustained_duration_minutes {
                    r.sustained_duration_minutes = sustained;
                }
            }
            Rule::Business(r) => {
                apply_common(
                    patch,
                    &mut r.name,
                    &mut r.condition,
                    &mut r.threshold,
                    &mut r.severity,
                    &mut r.cooldown_minutes,
                    &mut r.enabled,
                );
                if let Some(period) = patch.comparison_period {
                    r.comparison_period = period;
                }
            }
        }
        rule
    }
}

impl From<PerformanceRule> for Rule {
    fn from(rule: PerformanceRule) -> Self {
        Rule::Performance(rule)
    }
}

impl From<BusinessRule> for Rule {
    fn from(rule: BusinessRule) -> Self {
        Rule::Business(rule)
    }
}

/// 规则部分更新
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulePatch {
    pub name: Option<String>,
    pub condition: Option<Condition>,
    pub threshold: Option<f64>,
    pub severity: Option<Severity>,
    pub cooldown_minutes: Option<u32>,
    pub enabled: Option<bool>,
    pub sustained_duration_minutes: Option<u32>,
    pub comparison_period: Option<ComparisonPeriod>,
}

fn apply_common(
    patch: &RulePatch,
    name: &mut String,
    condition: &mut Condition,
    threshold: &mut f64,
    severity: &mut Severity,
    cooldown: &mut u32,
    enabled: &mut bool,
) {
    if let Some(v) = &patch.name {
        *name = v.clone();
    }
    if let Some(v) = patch.condition {
        *condition = v;
    }
    if let Some(v) = patch.threshold {
        *threshold = v;
    }
    if let Some(v) = patch.severity {
        *severity = v;
    }
    if let Some(v) = patch.cooldown_minutes {
        *cooldown = v;
    }
    if let Some(v) = patch.enabled {
        *enabled = v;
    }
}

fn validate_identity(id: &str, name: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(AlertError::invalid_rule(id, "id must not be empty"));
    }
    if name.trim().is_empty() {
        return Err(AlertError::invalid_rule(id, "name must not be empty"));
    }
    Ok(())
}

impl PerformanceRule {
    pub fn validate(&self) -> Result<()> {
        validate_identity(&self.id, &self.name)?;
        if !self.threshold.is_finite() {
            return Err(AlertError::invalid_rule(&self.id, "threshold must be finite"));
        }
        if self.condition == Condition::PctChange {
            return Err(AlertError::invalid_rule(
                &self.id,
                "pct_change is only supported on business rules",
            ));
        }
        if self.threshold < 0.0 {
            return Err(AlertError::invalid_rule(
                &self.id,
                format!("{} cannot be negative, threshold {} is unreachable", self.metric, self.threshold),
            ));
        }
        if self.metric.is_percentage() && self.threshold > 100.0 {
            return Err(AlertError::invalid_rule(
                &self.id,
                format!("{} is a percentage, threshold {} exceeds 100", self.metric, self.threshold),
            ));
        }
        Ok(())
    }
}

impl BusinessRule {
    pub fn validate(&self) -> Result<()> {
        validate_identity(&self.id, &self.name)?;
        if self.metric.split('.').any(|s| s.trim().is_empty()) {
            return Err(AlertError::invalid_rule(
                &self.id,
                format!("invalid metric path '{}'", self.metric),
            ));
        }
        if !self.threshold.is_finite() {
            return Err(AlertError::invalid_rule(&self.id, "threshold must be finite"));
        }
        if self.condition == Condition::PctChange && self.threshold == 0.0 {
            return Err(AlertError::invalid_rule(
                &self.id,
                "pct_change threshold must be non-zero",
            ));
        }
        Ok(())
    }
}

/// 规则求值输入：当前快照 + 历史基线
pub struct EvaluationInput<'a> {
    pub performance: Option<&'a PerformanceSnapshot>,
    pub business: Option<&'a BusinessSnapshot>,
    pub baselines: &'a BaselineTracker,
}

/// 单条规则对当前数据的观测结果
#[derive(Debug, Clone)]
pub struct Observation {
    pub value: f64,
    pub breached: bool,
    pub message: String,
    pub context: AlertContext,
}

/// 可求值的告警规则
///
/// `observe` 返回 `None` 表示本轮数据不足（指标缺失、没有基线），
/// 规则在本轮被跳过，既不触发也不视为恢复。
pub trait AlertRule: Send + Sync {
    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn kind(&self) -> RuleKind;

    fn metric_name(&self) -> &str;

    fn threshold(&self) -> f64;

    fn severity(&self) -> Severity;

    fn cooldown_minutes(&self) -> u32;

    fn is_enabled(&self) -> bool;

    fn sustained_minutes(&self) -> u32 {
        0
    }

    fn observe(&self, input: &EvaluationInput<'_>) -> Option<Observation>;
}

impl AlertRule for PerformanceRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Performance
    }

    fn metric_name(&self) -> &str {
        self.metric.as_str()
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn cooldown_minutes(&self) -> u32 {
        self.cooldown_minutes
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn sustained_minutes(&self) -> u32 {
        self.sustained_duration_minutes
    }

    fn observe(&self, input: &EvaluationInput<'_>) -> Option<Observation> {
        let snapshot = input.performance?;
        let value = snapshot.get(self.metric)?;
        let breached = self.condition.compare(value, self.threshold)?;

        Some(Observation {
            value,
            breached,
            message: format!(
                "{} is {:.2} ({} {:.2})",
                self.metric, value, self.condition, self.threshold
            ),
            context: snapshot.to_context(),
        })
    }
}

impl AlertRule for BusinessRule {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RuleKind {
        RuleKind::Business
    }

    fn metric_name(&self) -> &str {
        &self.metric
    }

    fn threshold(&self) -> f64 {
        self.threshold
    }

    fn severity(&self) -> Severity {
        self.severity
    }

    fn cooldown_minutes(&self) -> u32 {
        self.cooldown_minutes
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn observe(&self, input: &EvaluationInput<'_>) -> Option<Observation> {
        let value = input.business?.resolve(&self.metric)?;

        let mut context = AlertContext::new();
        context.insert("value".to_string(), serde_json::json!(value));

        if self.condition != Condition::PctChange {
            let breached = self.condition.compare(value, self.threshold)?;
            return Some(Observation {
                value,
                breached,
                message: format!(
                    "{} is {:.2} ({} {:.2})",
                    self.metric, value, self.condition, self.threshold
                ),
                context,
            });
        }

        // 没有基线（或基线为 0）时跳过，绝不当作 0 基线处理
        let baseline = input
            .baselines
            .average_for(RuleKind::Business, &self.metric, self.comparison_period)?;
        if baseline.abs() < f64::EPSILON {
            return None;
        }

        let pct_change = (value - baseline) / baseline * 100.0;
        let breached = pct_change.abs() >= self.threshold.abs();

        context.insert("baseline".to_string(), serde_json::json!(baseline));
        context.insert("pct_change".to_string(), serde_json::json!(pct_change));
        context.insert(
            "comparison_period".to_string(),
            serde_json::json!(self.comparison_period.as_str()),
        );

        Some(Observation {
            value,
            breached,
            message: format!(
                "{} changed by {:.1}% against the {} baseline {:.2} (threshold {:.1}%)",
                self.metric,
                pct_change,
                self.comparison_period.as_str(),
                baseline,
                self.threshold
            ),
            context,
        })
    }
}
