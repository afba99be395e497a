use crate::rule::{BusinessRule, ComparisonPeriod, Condition, PerformanceMetric, PerformanceRule, Rule};
use vigil_types::Severity;

#[allow(clippy::too_many_arguments)]
fn performance(
    id: &str,
    name: &str,
    metric: PerformanceMetric,
    condition: Condition,
    threshold: f64,
    sustained: u32,
    severity: Severity,
    cooldown: u32,
) -> Rule {
    Rule::Performance(PerformanceRule {
        id: id.to_string(),
        name: name.to_string(),
        metric,
        condition,
        threshold,
        sustained_duration_minutes: sustained,
        severity,
        cooldown_minutes: cooldown,
        enabled: true,
    })
}

#[allow(clippy::too_many_arguments)]
fn business(
    id: &str,
    name: &str,
    metric: &str,
    condition: Condition,
    threshold: f64,
    period: ComparisonPeriod,
    severity: Severity,
    cooldown: u32,
) -> Rule {
    Rule::Business(BusinessRule {
        id: id.to_string(),
        name: name.to_string(),
        metric: metric.to_string(),
        condition,
        threshold,
        comparison_period: period,
        severity,
        cooldown_minutes: cooldown,
        enabled: true,
    })
}

/// 默认性能规则
#[rustfmt::skip]
pub fn default_performance_rules() -> Vec<Rule> {
    use Condition::*;
    use PerformanceMetric::*;

    vec![
        performance("perf-error-rate", "High Error Rate", ErrorRate, Gt, 5.0, 0, Severity::Critical, 10),
        performance("perf-response-time", "Slow Response Time", ResponseTime, Gt, 2000.0, 5, Severity::High, 15),
        performance("perf-throughput", "Low Throughput", Throughput, Lt, 10.0, 10, Severity::Medium, 30),
        performance("perf-cpu", "High CPU Usage", Cpu, Gt, 80.0, 10, Severity::High, 15),
        performance("perf-memory", "High Memory Usage", Memory, Gt, 85.0, 10, Severity::High, 15),
        performance("perf-disk", "Disk Nearly Full", Disk, Gt, 90.0, 0, Severity::Critical, 60),
        performance("perf-network", "Network Saturation", Network, Gt, 800.0, 5, Severity::Medium, 30),
    ]
}

/// 默认业务规则
#[rustfmt::skip]
pub fn default_business_rules() -> Vec<Rule> {
    use ComparisonPeriod::*;
    use Condition::*;

    vec![
        business("biz-mrr-drop", "MRR Drop", "revenue.monthlyRecurringRevenue", PctChange, -10.0, Month, Severity::High, 1440),
        business("biz-churn", "High Churn Rate", "revenue.churnRate", Gt, 5.0, Month, Severity::High, 1440),
        business("biz-trial-conversion", "Low Trial Conversion", "conversion.trialToPayingRate", Lt, 15.0, Week, Severity::Medium, 1440),
        business("biz-dau-drop", "Daily Active Users Drop", "userEngagement.dailyActiveUsers", PctChange, -20.0, Day, Severity::High, 360),
        business("biz-runway-drop", "Runway Shrinking", "financial.runway", PctChange, -15.0, Month, Severity::Critical, 1440),
        business("biz-burn-spike", "Burn Rate Spike", "financial.burnRate", PctChange, 25.0, Month, Severity::High, 1440),
    ]
}

/// 全部默认规则
pub fn default_rules() -> Vec<Rule> {
    let mut rules = default_performance_rules();
    rules.extend(default_business_rules());
    rules
}
