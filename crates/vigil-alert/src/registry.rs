use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::RwLock;
use tracing::{debug, info};
use vigil_types::Alert;

/// 默认历史容量
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// 自动恢复时的处理人
pub const SYSTEM_RESOLVER: &str = "system";

struct ActiveEntry {
    alert: Alert,
    /// 最近一次仍处于越限状态的时间
    last_seen: DateTime<Utc>,
}

/// 告警登记表：活跃告警 + 有界历史
pub struct AlertRegistry {
    active: RwLock<HashMap<String, ActiveEntry>>,
    history: RwLock<VecDeque<Alert>>,
    history_limit: usize,
}

impl AlertRegistry {
    pub fn new(history_limit: usize) -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            history_limit: history_limit.max(1),
        }
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// 登记新告警
    pub async fn insert(&self, alert: Alert) {
        {
            let mut history = self.history.write().await;
            history.push_back(alert.clone());
            while history.len() > self.history_limit {
                history.pop_front();
            }
        }

        let last_seen = alert.triggered_at;
        self.active
            .write()
            .await
            .insert(alert.id.clone(), ActiveEntry { alert, last_seen });
    }

    /// 确认告警；未知或已恢复的告警返回 `false`
    pub async fn acknowledge(&self, alert_id: &str, by: &str, now: DateTime<Utc>) -> bool {
        let acknowledged = {
            let mut active = self.active.write().await;
            match active.get_mut(alert_id) {
                Some(entry) => {
                    entry.alert.acknowledge(by, now);
                    entry.alert.clone()
                }
                None => return false,
            }
        };

        self.sync_history(&acknowledged).await;
        info!(alert_id, by, "Alert acknowledged");
        true
    }

    /// 恢复告警，返回恢复后的告警；未知或已恢复返回 `None`
    pub async fn resolve(
        &self,
        alert_id: &str,
        by: Option<String>,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let mut entry = self.active.write().await.remove(alert_id)?;
        entry.alert.resolve(by, now);
        self.sync_history(&entry.alert).await;

        info!(
            alert_id,
            rule_id = %entry.alert.rule_id,
            resolved_by = ?entry.alert.resolved_by,
            duration_minutes = ?entry.alert.duration_minutes,
            "Alert resolved"
        );
        Some(entry.alert)
    }

    /// 刷新仍在越限的规则对应告警的活跃时间
    pub async fn touch(&self, breaching: &HashSet<String>, now: DateTime<Utc>) {
        let mut active = self.active.write().await;
        for entry in active.values_mut() {
            if breaching.contains(&entry.alert.rule_id) {
                entry.last_seen = now;
            }
        }
    }

    /// 自动恢复：规则已不再越限且超过 `auto_resolve_minutes` 没有活动的告警
    pub async fn sweep_stale(
        &self,
        breaching: &HashSet<String>,
        now: DateTime<Utc>,
        auto_resolve_minutes: u32,
    ) -> Vec<Alert> {
        let window = Duration::minutes(auto_resolve_minutes as i64);
        let stale: Vec<String> = {
            let active = self.active.read().await;
            active
                .iter()
                .filter(|(_, entry)| {
                    !breaching.contains(&entry.alert.rule_id) && now - entry.last_seen >= window
                })
                .map(|(id, _)| id.clone())
                .collect()
        };

        let mut resolved = Vec::with_capacity(stale.len());
        for id in stale {
            if let Some(alert) = self
                .resolve(&id, Some(SYSTEM_RESOLVER.to_string()), now)
                .await
            {
                resolved.push(alert);
            }
        }

        if !resolved.is_empty() {
            debug!(count = resolved.len(), "Auto-resolved stale alerts");
        }
        resolved
    }

    pub async fn get_active(&self, alert_id: &str) -> Option<Alert> {
        self.active
            .read()
            .await
            .get(alert_id)
            .map(|entry| entry.alert.clone())
    }

    /// 活跃告警，按级别从高到低、触发时间从新到旧排序
    pub async fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts: Vec<Alert> = self
            .active
            .read()
            .await
            .values()
            .map(|entry| entry.alert.clone())
            .collect();
        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| b.triggered_at.cmp(&a.triggered_at))
        });
        alerts
    }

    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }

    /// 最近 `hours` 小时内触发的历史告警，最新在前
    pub async fn history(&self, hours: u32, now: DateTime<Utc>) -> Vec<Alert> {
        let cutoff = now - Duration::hours(hours as i64);
        self.history
            .read()
            .await
            .iter()
            .rev()
            .filter(|alert| alert.triggered_at >= cutoff)
            .cloned()
            .collect()
    }

    pub async fn history_snapshot(&self) -> Vec<Alert> {
        self.history.read().await.iter().cloned().collect()
    }

    pub async fn history_len(&self) -> usize {
        self.history.read().await.len()
    }

    async fn sync_history(&self, alert: &Alert) {
        let mut history = self.history.write().await;
        if let Some(slot) = history.iter_mut().rev().find(|a| a.id == alert.id) {
            *slot = alert.clone();
        }
    }
}

impl Default for AlertRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}
