use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use vigil_alert::{EngineSettings, EscalationPolicy};
use vigil_logging::LoggingConfig;
use vigil_notify::ChannelConfig;
use vigil_types::Severity;

/// 全局配置（`vigil.toml`）
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GlobalConfig {
    pub system: SystemConfig,
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
    pub providers: ProvidersConfig,
    pub channels: Vec<ChannelConfig>,
    pub escalation: Vec<EscalationBinding>,
    pub rules: RulesConfig,
}

/// 系统配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub name: String,
    pub version: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            name: "Vigil Alerting Engine".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub evaluation_interval_secs: u64,
    pub escalation_check_interval_secs: u64,
    pub baseline_window: usize,
    pub history_limit: usize,
    pub auto_resolve_minutes: u32,
    pub channel_timeout_secs: u64,
    pub analytics_window_days: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            evaluation_interval_secs: 120,
            escalation_check_interval_secs: 30,
            baseline_window: 168,
            history_limit: 1000,
            auto_resolve_minutes: 60,
            channel_timeout_secs: 10,
            analytics_window_days: 7,
        }
    }
}

impl EngineConfig {
    pub fn to_settings(&self) -> EngineSettings {
        EngineSettings {
            evaluation_interval: Duration::from_secs(self.evaluation_interval_secs),
            escalation_check_interval: Duration::from_secs(self.escalation_check_interval_secs),
            baseline_window: self.baseline_window,
            history_limit: self.history_limit,
            auto_resolve_minutes: self.auto_resolve_minutes,
            analytics_window_days: self.analytics_window_days,
        }
    }

    pub fn channel_timeout(&self) -> Duration {
        Duration::from_secs(self.channel_timeout_secs)
    }
}

/// 指标数据源配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub performance_url: Option<String>,
    pub business_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            performance_url: None,
            business_url: None,
            request_timeout_secs: 10,
        }
    }
}

/// 告警级别 -> 升级策略
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EscalationBinding {
    pub severity: Severity,
    pub policy: EscalationPolicy,
}

/// 规则来源
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// 是否加载内置默认规则
    pub load_defaults: bool,

    /// 规则文件（JSON 或 TOML），相对路径基于配置目录
    pub file: Option<PathBuf>,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            load_defaults: true,
            file: None,
        }
    }
}

impl GlobalConfig {
    /// 检查配置一致性
    pub fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.evaluation_interval_secs == 0 {
            return Err(anyhow!("engine.evaluation_interval_secs must be greater than 0"));
        }
        if engine.escalation_check_interval_secs == 0 {
            return Err(anyhow!("engine.escalation_check_interval_secs must be greater than 0"));
        }
        if engine.channel_timeout_secs == 0 {
            return Err(anyhow!("engine.channel_timeout_secs must be greater than 0"));
        }
        if engine.baseline_window == 0 || engine.history_limit == 0 {
            return Err(anyhow!("engine.baseline_window and engine.history_limit must be greater than 0"));
        }

        let mut names = HashSet::new();
        for channel in &self.channels {
            if channel.name.trim().is_empty() {
                return Err(anyhow!("channel name must not be empty"));
            }
            if !names.insert(channel.name.as_str()) {
                return Err(anyhow!("duplicate channel name: {}", channel.name));
            }
        }

        let mut severities = HashSet::new();
        for binding in &self.escalation {
            if !severities.insert(binding.severity) {
                return Err(anyhow!(
                    "more than one escalation policy for severity {}",
                    binding.severity
                ));
            }
            if binding.policy.levels.is_empty() {
                return Err(anyhow!(
                    "escalation policy {} has no levels",
                    binding.policy.id
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_global_config() {
        let config = GlobalConfig::default();
        assert_eq!(config.system.name, "Vigil Alerting Engine");
        assert_eq!(config.engine.evaluation_interval_secs, 120);
        assert_eq!(config.engine.history_limit, 1000);
        assert!(config.rules.load_defaults);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_settings_conversion() {
        let settings = EngineConfig::default().to_settings();
        assert_eq!(settings.evaluation_interval, Duration::from_secs(120));
        assert_eq!(settings.escalation_check_interval, Duration::from_secs(30));
        assert_eq!(settings.auto_resolve_minutes, 60);
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = GlobalConfig::default();
        config.engine.evaluation_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_escalation() {
        let policy = EscalationPolicy {
            id: "p".to_string(),
            name: "p".to_string(),
            initial_delay_minutes: 0,
            levels: vec![vigil_alert::EscalationLevel {
                delay_minutes: 5,
                channels: vec![vigil_types::ChannelKind::Pager],
                recipients: vec![],
            }],
        };
        let mut config = GlobalConfig::default();
        config.escalation = vec![
            EscalationBinding {
                severity: Severity::Critical,
                policy: policy.clone(),
            },
            EscalationBinding {
                severity: Severity::Critical,
                policy,
            },
        ];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sample_config_is_valid() {
        let config: GlobalConfig =
            toml::from_str(include_str!("../../../config/vigil.toml")).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.escalation[0].policy.levels.len(), 2);
    }
}
