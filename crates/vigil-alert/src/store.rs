use crate::error::{AlertError, Result};
use crate::rule::{BusinessRule, PerformanceRule, Rule, RulePatch};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::info;

/// 规则存储（内存实现）
///
/// 性能规则与业务规则分开存放，ID 在两个集合间唯一。
/// 需要同时持有两把锁时，总是先锁性能规则再锁业务规则。
pub struct RuleStore {
    performance: RwLock<HashMap<String, PerformanceRule>>,
    business: RwLock<HashMap<String, BusinessRule>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self {
            performance: RwLock::new(HashMap::new()),
            business: RwLock::new(HashMap::new()),
        }
    }

    /// 添加规则（校验失败或 ID 重复时拒绝）
    pub async fn add(&self, rule: Rule) -> Result<()> {
        rule.validate()?;

        let mut performance = self.performance.write().await;
        let mut business = self.business.write().await;
        let id = rule.id().to_string();
        if performance.contains_key(&id) || business.contains_key(&id) {
            return Err(AlertError::DuplicateRule(id));
        }

        info!(rule_id = %id, kind = %rule.kind(), "Rule added");
        match rule {
            Rule::Performance(r) => {
                performance.insert(id, r);
            }
            Rule::Business(r) => {
                business.insert(id, r);
            }
        }
        Ok(())
    }

    /// 部分更新；规则不存在时返回 `Ok(None)`，校验失败时原规则保持不变
    pub async fn update(&self, rule_id: &str, patch: &RulePatch) -> Result<Option<Rule>> {
        let mut performance = self.performance.write().await;
        if let Some(existing) = performance.get_mut(rule_id) {
            let patched = Rule::Performance(existing.clone()).patched(patch);
            patched.validate()?;
            if let Rule::Performance(r) = &patched {
                *existing = r.clone();
            }
            info!(rule_id, "Rule updated");
            return Ok(Some(patched));
        }

        let mut business = self.business.write().await;
        if let Some(existing) = business.get_mut(rule_id) {
            let patched = Rule::Business(existing.clone()).patched(patch);
            patched.validate()?;
            if let Rule::Business(r) = &patched {
                *existing = r.clone();
            }
            info!(rule_id, "Rule updated");
            return Ok(Some(patched));
        }

        Ok(None)
    }

    pub async fn remove(&self, rule_id: &str) -> Option<Rule> {
        let mut performance = self.performance.write().await;
        let mut business = self.business.write().await;

        let removed = performance
            .remove(rule_id)
            .map(Rule::Performance)
            .or_else(|| business.remove(rule_id).map(Rule::Business));
        if removed.is_some() {
            info!(rule_id, "Rule removed");
        }
        removed
    }

    pub async fn get(&self, rule_id: &str) -> Option<Rule> {
        if let Some(r) = self.performance.read().await.get(rule_id) {
            return Some(Rule::Performance(r.clone()));
        }
        self.business
            .read()
            .await
            .get(rule_id)
            .map(|r| Rule::Business(r.clone()))
    }

    /// 所有规则：性能规则在前，组内按 ID 排序
    pub async fn list(&self) -> Vec<Rule> {
        let mut performance: Vec<Rule> = self
            .performance
            .read()
            .await
            .values()
            .cloned()
            .map(Rule::Performance)
            .collect();
        performance.sort_by(|a, b| a.id().cmp(b.id()));

        let mut business: Vec<Rule> = self
            .business
            .read()
            .await
            .values()
            .cloned()
            .map(Rule::Business)
            .collect();
        business.sort_by(|a, b| a.id().cmp(b.id()));

        performance.extend(business);
        performance
    }

    pub async fn list_enabled(&self) -> Vec<Rule> {
        self.list()
            .await
            .into_iter()
            .filter(|r| r.is_enabled())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.performance.read().await.len() + self.business.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}
