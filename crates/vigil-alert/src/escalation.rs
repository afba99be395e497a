use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};
use vigil_types::ChannelKind;

/// 升级级别
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationLevel {
    /// 相对上一级的延迟（第一级相对 `initial_delay_minutes`）
    pub delay_minutes: u32,

    pub channels: Vec<ChannelKind>,

    #[serde(default)]
    pub recipients: Vec<String>,
}

/// 升级策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationPolicy {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub initial_delay_minutes: u32,

    pub levels: Vec<EscalationLevel>,
}

/// 升级状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationState {
    Armed { next_level: usize },
    Cancelled,
    Exhausted,
}

impl EscalationState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, EscalationState::Armed { .. })
    }
}

/// 到期的升级动作
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationFire {
    pub alert_id: String,
    pub policy_id: String,
    pub level: usize,
    pub channels: Vec<ChannelKind>,
    pub recipients: Vec<String>,
}

struct Tracked {
    policy: EscalationPolicy,
    state: EscalationState,
    next_due: DateTime<Utc>,
}

/// 升级调度器
///
/// 纯状态机，由外部周期性调用 `due(now)` 推进。
pub struct EscalationScheduler {
    tracked: Mutex<HashMap<String, Tracked>>,
}

impl EscalationScheduler {
    pub fn new() -> Self {
        Self {
            tracked: Mutex::new(HashMap::new()),
        }
    }

    /// 为告警挂载升级策略；策略没有级别或告警已挂载时返回 `false`
    pub async fn arm(&self, alert_id: &str, policy: &EscalationPolicy, now: DateTime<Utc>) -> bool {
        let Some(first) = policy.levels.first() else {
            return false;
        };

        let mut tracked = self.tracked.lock().await;
        if tracked.contains_key(alert_id) {
            return false;
        }

        let next_due = now
            + Duration::minutes(policy.initial_delay_minutes as i64)
            + Duration::minutes(first.delay_minutes as i64);
        tracked.insert(
            alert_id.to_string(),
            Tracked {
                policy: policy.clone(),
                state: EscalationState::Armed { next_level: 0 },
                next_due,
            },
        );

        debug!(alert_id, policy_id = %policy.id, next_due = %next_due, "Escalation armed");
        true
    }

    /// 取消升级；只有处于 Armed 状态时返回 `true`
    pub async fn cancel(&self, alert_id: &str) -> bool {
        let mut tracked = self.tracked.lock().await;
        match tracked.get_mut(alert_id) {
            Some(entry) if !entry.state.is_finished() => {
                entry.state = EscalationState::Cancelled;
                debug!(alert_id, "Escalation cancelled");
                true
            }
            _ => false,
        }
    }

    /// 推进所有到期的升级；错过多个级别时一次补齐
    pub async fn due(&self, now: DateTime<Utc>) -> Vec<EscalationFire> {
        let mut fires = Vec::new();
        let mut tracked = self.tracked.lock().await;

        for (alert_id, entry) in tracked.iter_mut() {
            while let EscalationState::Armed { next_level } = entry.state {
                if entry.next_due > now {
                    break;
                }

                let level = &entry.policy.levels[next_level];
                fires.push(EscalationFire {
                    alert_id: alert_id.clone(),
                    policy_id: entry.policy.id.clone(),
                    level: next_level,
                    channels: level.channels.clone(),
                    recipients: level.recipients.clone(),
                });
                info!(
                    alert_id = %alert_id,
                    policy_id = %entry.policy.id,
                    level = next_level + 1,
                    "Escalation level due"
                );

                match entry.policy.levels.get(next_level + 1) {
                    Some(next) => {
                        entry.next_due = entry.next_due + Duration::minutes(next.delay_minutes as i64);
                        entry.state = EscalationState::Armed {
                            next_level: next_level + 1,
                        };
                    }
                    None => entry.state = EscalationState::Exhausted,
                }
            }
        }

        fires.sort_by(|a, b| a.alert_id.cmp(&b.alert_id).then(a.level.cmp(&b.level)));
        fires
    }

    pub async fn state(&self, alert_id: &str) -> Option<EscalationState> {
        self.tracked.lock().await.get(alert_id).map(|e| e.state)
    }

    /// 移除已取消或已耗尽的条目
    pub async fn purge_finished(&self) -> usize {
        let mut tracked = self.tracked.lock().await;
        let before = tracked.len();
        tracked.retain(|_, entry| !entry.state.is_finished());
        before - tracked.len()
    }

    pub async fn armed_count(&self) -> usize {
        self.tracked
            .lock()
            .await
            .values()
            .filter(|e| !e.state.is_finished())
            .count()
    }
}

impl Default for EscalationScheduler {
    fn default() -> Self {
        Self::new()
    }
}
