use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// 冷却表：规则键 -> 最后一次触发时间
///
/// 检查与写入在同一个 entry 锁内完成，同一规则的并发求值不会同时通过。
pub struct CooldownRegistry {
    last_triggered: DashMap<String, DateTime<Utc>>,
}

impl CooldownRegistry {
    pub fn new() -> Self {
        Self {
            last_triggered: DashMap::new(),
        }
    }

    /// 不在冷却期内时记录触发时间并返回 `true`；冷却期内返回 `false` 且不做任何修改
    pub fn try_acquire(&self, key: &str, cooldown_minutes: u32, now: DateTime<Utc>) -> bool {
        let cooldown = Duration::minutes(cooldown_minutes as i64);
        match self.last_triggered.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                let elapsed = now - *entry.get();
                if elapsed < cooldown {
                    debug!(
                        key,
                        elapsed_secs = elapsed.num_seconds(),
                        cooldown_minutes,
                        "Trigger suppressed by cooldown"
                    );
                    false
                } else {
                    entry.insert(now);
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    pub fn is_cooling_down(&self, key: &str, cooldown_minutes: u32, now: DateTime<Utc>) -> bool {
        self.last_triggered
            .get(key)
            .is_some_and(|last| now - *last < Duration::minutes(cooldown_minutes as i64))
    }

    pub fn last_triggered(&self, key: &str) -> Option<DateTime<Utc>> {
        self.last_triggered.get(key).map(|t| *t)
    }

    pub fn clear(&self, key: &str) {
        self.last_triggered.remove(key);
    }

    /// 清理超过 `max_age` 的记录
    pub fn prune(&self, max_age: Duration, now: DateTime<Utc>) {
        self.last_triggered.retain(|_, last| now - *last < max_age);
    }

    pub fn len(&self) -> usize {
        self.last_triggered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_triggered.is_empty()
    }
}

impl Default for CooldownRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_cooldown_window() {
        let registry = CooldownRegistry::new();
        let t0 = Utc::now();

        assert!(registry.try_acquire("performance:error-rate", 10, t0));
        assert!(!registry.try_acquire("performance:error-rate", 10, t0 + Duration::minutes(1)));
        assert!(!registry.try_acquire("performance:error-rate", 10, t0 + Duration::seconds(599)));
        assert!(registry.try_acquire("performance:error-rate", 10, t0 + Duration::minutes(10)));
        assert_eq!(
            registry.last_triggered("performance:error-rate"),
            Some(t0 + Duration::minutes(10))
        );
    }

    #[test]
    fn test_suppressed_attempt_does_not_extend_window() {
        let registry = CooldownRegistry::new();
        let t0 = Utc::now();
        assert!(registry.try_acquire("k", 10, t0));
        assert!(!registry.try_acquire("k", 10, t0 + Duration::minutes(9)));
        assert!(registry.try_acquire("k", 10, t0 + Duration::minutes(10)));
    }

    #[test]
    fn test_zero_cooldown_never_suppresses() {
        let registry = CooldownRegistry::new();
        let t0 = Utc::now();
        assert!(registry.try_acquire("k", 0, t0));
        assert!(registry.try_acquire("k", 0, t0));
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = CooldownRegistry::new();
        let t0 = Utc::now();
        assert!(registry.try_acquire("performance:a", 30, t0));
        assert!(registry.try_acquire("business:a", 30, t0));
        assert!(registry.is_cooling_down("performance:a", 30, t0));

        registry.clear("performance:a");
        assert!(!registry.is_cooling_down("performance:a", 30, t0));

        registry.prune(Duration::minutes(5), t0 + Duration::minutes(6));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_concurrent_acquire_only_one_wins() {
        let registry = Arc::new(CooldownRegistry::new());
        let now = Utc::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.try_acquire("performance:cpu", 5, now))
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
