use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use vigil_types::{Alert, RuleKind, Severity};

/// 统计窗口默认天数
pub const DEFAULT_ANALYTICS_WINDOW_DAYS: u32 = 7;

const TOP_RULES: usize = 5;

/// 规则触发次数
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFrequency {
    pub rule_id: String,
    pub rule_name: String,
    pub count: usize,
}

/// 告警统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertAnalytics {
    pub window_days: u32,
    pub total: usize,
    pub active: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_kind: BTreeMap<RuleKind, usize>,

    /// 窗口内已恢复告警的平均处理时长
    pub mean_resolution_minutes: Option<f64>,

    /// 触发最多的规则（最多 5 条）
    pub top_rules: Vec<RuleFrequency>,
}

impl AlertAnalytics {
    /// 基于历史告警计算窗口内统计
    pub fn compute(history: &[Alert], active: usize, now: DateTime<Utc>, window_days: u32) -> Self {
        let cutoff = now - Duration::days(window_days as i64);
        let recent: Vec<&Alert> = history.iter().filter(|a| a.triggered_at >= cutoff).collect();

        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_kind: BTreeMap<RuleKind, usize> = BTreeMap::new();
        let mut per_rule: HashMap<&str, (&str, usize)> = HashMap::new();
        let mut resolution_total = 0i64;
        let mut resolved = 0usize;

        for alert in &recent {
            *by_severity.entry(alert.severity).or_insert(0) += 1;
            *by_kind.entry(alert.rule_kind).or_insert(0) += 1;
            per_rule
                .entry(alert.rule_id.as_str())
                .or_insert((alert.rule_name.as_str(), 0))
                .1 += 1;

            if let Some(minutes) = alert.duration_minutes {
                resolution_total += minutes;
                resolved += 1;
            }
        }

        let mut top_rules: Vec<RuleFrequency> = per_rule
            .into_iter()
            .map(|(rule_id, (rule_name, count))| RuleFrequency {
                rule_id: rule_id.to_string(),
                rule_name: rule_name.to_string(),
                count,
            })
            .collect();
        top_rules.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.rule_id.cmp(&b.rule_id)));
        top_rules.truncate(TOP_RULES);

        Self {
            window_days,
            total: recent.len(),
            active,
            by_severity,
            by_kind,
            mean_resolution_minutes: (resolved > 0)
                .then(|| resolution_total as f64 / resolved as f64),
            top_rules,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(rule_id: &str, severity: Severity, kind: RuleKind, at: DateTime<Utc>) -> Alert {
        Alert::new(rule_id, rule_id, kind, "metric", 1.0, 0.0, severity, "", at)
    }

    #[test]
    fn test_empty_history() {
        let analytics = AlertAnalytics::compute(&[], 0, Utc::now(), 7);
        assert_eq!(analytics.total, 0);
        assert_eq!(analytics.mean_resolution_minutes, None);
        assert!(analytics.top_rules.is_empty());
        assert_eq!(analytics.by_severity[&Severity::Critical], 0);
    }

    #[test]
    fn test_window_and_breakdowns() {
        let now = Utc::now();
        let mut history = vec![
            alert("stale", Severity::Low, RuleKind::Business, now - Duration::days(8)),
            alert("cpu", Severity::High, RuleKind::Performance, now - Duration::days(2)),
            alert("cpu", Severity::High, RuleKind::Performance, now - Duration::days(1)),
            alert("runway", Severity::Critical, RuleKind::Business, now - Duration::hours(3)),
        ];
        let t = history[1].triggered_at;
        history[1].resolve(Some("bob".to_string()), t + Duration::minutes(30));
        let t = history[3].triggered_at;
        history[3].resolve(None, t + Duration::minutes(90));

        let analytics = AlertAnalytics::compute(&history, 1, now, 7);
        assert_eq!(analytics.total, 3);
        assert_eq!(analytics.active, 1);
        assert_eq!(analytics.by_severity[&Severity::High], 2);
        assert_eq!(analytics.by_severity[&Severity::Low], 0);
        assert_eq!(analytics.by_kind[&RuleKind::Performance], 2);
        assert_eq!(analytics.by_kind[&RuleKind::Business], 1);
        assert_eq!(analytics.mean_resolution_minutes, Some(60.0));
        assert_eq!(analytics.top_rules[0].rule_id, "cpu");
        assert_eq!(analytics.top_rules[0].count, 2);
    }

    #[test]
    fn test_top_rules_limited_to_five() {
        let now = Utc::now();
        let history: Vec<Alert> = (0..8)
            .flat_map(|i| {
                (0..=i).map(move |_| {
                    alert(&format!("rule-{}", i), Severity::Medium, RuleKind::Performance, now)
                })
            })
            .collect();

        let analytics = AlertAnalytics::compute(&history, 0, now, 7);
        assert_eq!(analytics.top_rules.len(), 5);
        assert_eq!(analytics.top_rules[0].rule_id, "rule-7");
        assert_eq!(analytics.top_rules[4].rule_id, "rule-3");
    }
}
