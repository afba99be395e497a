use crate::cooldown::CooldownRegistry;
use crate::rule::{AlertRule, EvaluationInput, Rule};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use vigil_types::{Alert, AlertContext};

/// 规则触发事件
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub rule: Rule,
    pub current_value: f64,
    pub message: String,
    pub context: AlertContext,
    pub at: DateTime<Utc>,
}

impl TriggerEvent {
    pub fn into_alert(self) -> Alert {
        let rule = self.rule.as_alert_rule();
        Alert::new(
            rule.id(),
            rule.name(),
            rule.kind(),
            rule.metric_name(),
            self.current_value,
            rule.threshold(),
            rule.severity(),
            self.message,
            self.at,
        )
        .with_context(self.context)
    }
}

/// 一轮求值的结果
#[derive(Debug, Default)]
pub struct Evaluation {
    pub triggers: Vec<TriggerEvent>,

    /// 当前条件成立的规则 ID（无论是否被冷却或持续时间拦下）
    pub breaching: HashSet<String>,

    /// 数据不足被跳过的规则数
    pub skipped: usize,

    /// 被冷却抑制的触发数
    pub suppressed: usize,
}

/// 规则求值器
pub struct RuleEvaluator {
    cooldowns: Arc<CooldownRegistry>,

    /// 持续型规则的越限起始时间
    breach_since: DashMap<String, DateTime<Utc>>,
}

impl RuleEvaluator {
    pub fn new(cooldowns: Arc<CooldownRegistry>) -> Self {
        Self {
            cooldowns,
            breach_since: DashMap::new(),
        }
    }

    pub fn cooldowns(&self) -> &Arc<CooldownRegistry> {
        &self.cooldowns
    }

    /// 对一组规则求值
    pub fn evaluate(
        &self,
        input: &EvaluationInput<'_>,
        rules: &[Rule],
        now: DateTime<Utc>,
    ) -> Evaluation {
        let mut evaluation = Evaluation::default();

        for rule in rules.iter().filter(|r| r.is_enabled()) {
            let alert_rule = rule.as_alert_rule();
            let key = rule.cooldown_key();

            let Some(observation) = alert_rule.observe(input) else {
                debug!(
                    rule_id = %alert_rule.id(),
                    metric = %alert_rule.metric_name(),
                    "Rule skipped, data unavailable"
                );
                self.breach_since.remove(&key);
                evaluation.skipped += 1;
                continue;
            };

            if !observation.breached {
                self.breach_since.remove(&key);
                continue;
            }

            evaluation.breaching.insert(alert_rule.id().to_string());

            if !self.sustained_long_enough(&key, alert_rule, now) {
                continue;
            }

            if !self
                .cooldowns
                .try_acquire(&key, alert_rule.cooldown_minutes(), now)
            {
                evaluation.suppressed += 1;
                continue;
            }

            info!(
                rule_id = %alert_rule.id(),
                severity = %alert_rule.severity(),
                value = observation.value,
                threshold = alert_rule.threshold(),
                "Alert rule triggered"
            );

            evaluation.triggers.push(TriggerEvent {
                rule: rule.clone(),
                current_value: observation.value,
                message: observation.message,
                context: observation.context,
                at: now,
            });
        }

        evaluation
    }

    /// 重置持续计时（规则条件被修改后）
    pub fn reset_streak(&self, rule: &Rule) {
        self.breach_since.remove(&rule.cooldown_key());
    }

    /// 清除规则的持续计时与冷却记录
    pub fn forget(&self, rule: &Rule) {
        let key = rule.cooldown_key();
        self.breach_since.remove(&key);
        self.cooldowns.clear(&key);
    }

    fn sustained_long_enough(&self, key: &str, rule: &dyn AlertRule, now: DateTime<Utc>) -> bool {
        let sustained = rule.sustained_minutes();
        if sustained == 0 {
            return true;
        }

        let since = *self.breach_since.entry(key.to_string()).or_insert(now);
        let held = now - since;
        if held < Duration::minutes(sustained as i64) {
            debug!(
                rule_id = %rule.id(),
                held_secs = held.num_seconds(),
                sustained_minutes = sustained,
                "Condition not yet sustained"
            );
            return false;
        }
        true
    }
}
