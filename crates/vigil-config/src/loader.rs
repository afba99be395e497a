use anyhow::{anyhow, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use vigil_alert::{default_rules, Rule};

use crate::GlobalConfig;

/// 全局配置文件名
pub const GLOBAL_CONFIG_FILE: &str = "vigil.toml";

/// 环境变量前缀（`VIGIL__ENGINE__EVALUATION_INTERVAL_SECS=60`）
pub const ENV_PREFIX: &str = "VIGIL";

#[derive(Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<Rule>,
}

/// 配置加载器
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// 创建配置加载器
    pub fn new<P: AsRef<Path>>(config_dir: P) -> Self {
        Self {
            config_dir: config_dir.as_ref().to_path_buf(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// 加载全局配置：默认值 <- vigil.toml <- 环境变量
    pub fn load_global(&self) -> Result<GlobalConfig> {
        let config_path = self.config_dir.join(GLOBAL_CONFIG_FILE);

        let mut builder = Config::builder();
        if config_path.exists() {
            builder = builder.add_source(File::new(
                config_path.to_str().ok_or_else(|| anyhow!("Invalid config path"))?,
                FileFormat::Toml,
            ));
        } else {
            debug!(path = %config_path.display(), "Config file not found, using defaults");
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let global: GlobalConfig = config
            .try_deserialize()
            .with_context(|| format!("Invalid configuration in {}", config_path.display()))?;
        Ok(global)
    }

    /// 加载并验证全局配置
    pub fn load_validated(&self) -> Result<GlobalConfig> {
        let global = self.load_global()?;
        global.validate()?;
        Ok(global)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        self.load_validated().map(|_| ())
    }

    /// 从文件加载规则，按扩展名识别 JSON 或 TOML
    ///
    /// JSON 可以是规则数组，也可以是 `{ "rules": [...] }`；TOML 使用 `[[rules]]`。
    pub fn load_rules<P: AsRef<Path>>(&self, path: P) -> Result<Vec<Rule>> {
        let path = self.resolve(path.as_ref());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read rule file {}", path.display()))?;

        let rules = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let value: serde_json::Value = serde_json::from_str(&content)?;
                if value.is_array() {
                    serde_json::from_value::<Vec<Rule>>(value)?
                } else {
                    serde_json::from_value::<RuleFile>(value)?.rules
                }
            }
            Some("toml") => toml::from_str::<RuleFile>(&content)?.rules,
            _ => {
                return Err(anyhow!(
                    "Unsupported rule file format: {} (expected .json or .toml)",
                    path.display()
                ))
            }
        };

        info!(path = %path.display(), count = rules.len(), "Rules loaded from file");
        Ok(rules)
    }

    /// 按配置组合默认规则与规则文件；同 ID 时文件中的规则覆盖默认规则
    pub fn load_configured_rules(&self, global: &GlobalConfig) -> Result<Vec<Rule>> {
        let mut rules = if global.rules.load_defaults {
            default_rules()
        } else {
            Vec::new()
        };

        if let Some(file) = &global.rules.file {
            for rule in self.load_rules(file)? {
                rules.retain(|existing| existing.id() != rule.id());
                rules.push(rule);
            }
        }
        Ok(rules)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use vigil_logging::LogFormat;
    use vigil_types::{ChannelKind, Severity};

    #[test]
    fn test_load_default_global_config() {
        let temp_dir = tempdir().unwrap();
        let loader = ConfigLoader::new(temp_dir.path());

        let config = loader.load_global().unwrap();
        assert_eq!(config.system.name, "Vigil Alerting Engine");
        assert!(config.channels.is_empty());
        assert!(loader.validate().is_ok());
    }

    #[test]
    fn test_load_global_config_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_content = r#"
[system]
name = "Billing Alerts"

[engine]
evaluation_interval_secs = 60
auto_resolve_minutes = 30

[logging]
level = "debug"
format = "json"

[providers]
performance_url = "http://metrics.internal/perf"

[[channels]]
name = "oncall-pager"
type = "pager"
routing_key = "R0UT1NGKEY"

[[channels]]
name = "ops-chat"
type = "chat"
webhook_url = "https://hooks.slack.com/services/T000/B000/XXX"
enabled = false

[[escalation]]
severity = "critical"

[escalation.policy]
id = "critical-oncall"
name = "Critical on-call"
initial_delay_minutes = 10

[[escalation.policy.levels]]
delay_minutes = 0
channels = ["pager"]

[rules]
load_defaults = false
file = "rules.toml"
"#;

        fs::write(temp_dir.path().join(GLOBAL_CONFIG_FILE), config_content).unwrap();

        let loader = ConfigLoader::new(temp_dir.path());
        let config = loader.load_validated().unwrap();

        assert_eq!(config.system.name, "Billing Alerts");
        assert_eq!(config.engine.evaluation_interval_secs, 60);
        assert_eq!(config.engine.history_limit, 1000);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(
            config.providers.performance_url.as_deref(),
            Some("http://metrics.internal/perf")
        );
        assert_eq!(config.channels.len(), 2);
        assert_eq!(config.channels[0].kind(), ChannelKind::Pager);
        assert!(!config.channels[1].enabled);
        assert_eq!(config.escalation[0].severity, Severity::Critical);
        assert_eq!(config.escalation[0].policy.levels[0].channels, vec![ChannelKind::Pager]);
        assert!(!config.rules.load_defaults);
    }

    #[test]
    fn test_load_rules_toml() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join("rules.toml"),
            r#"
[[rules]]
kind = "performance"
id = "api-latency"
name = "API latency"
metric = "response_time"
condition = "gt"
threshold = 1500.0
severity = "high"
cooldown_minutes = 15

[[rules]]
kind = "business"
id = "mrr-drop"
name = "MRR drop"
metric = "revenue.monthlyRecurringRevenue"
condition = "pct_change"
threshold = -10.0
comparison_period = "month"
severity = "high"
"#,
        )
        .unwrap();

        let loader = ConfigLoader::new(temp_dir.path());
        let rules = loader.load_rules("rules.toml").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].id(), "api-latency");
        assert!(rules.iter().all(|r| r.validate().is_ok()));
    }

    #[test]
    fn test_load_rules_json_array_and_object() {
        let temp_dir = tempdir().unwrap();
        let rule = serde_json::json!({
            "kind": "business",
            "id": "runway",
            "name": "Runway",
            "metric": "financial.runway",
            "condition": "lt",
            "threshold": 6.0,
            "severity": "critical"
        });
        fs::write(
            temp_dir.path().join("array.json"),
            serde_json::to_string(&vec![rule.clone()]).unwrap(),
        )
        .unwrap();
        fs::write(
            temp_dir.path().join("object.json"),
            serde_json::to_string(&serde_json::json!({ "rules": [rule] })).unwrap(),
        )
        .unwrap();

        let loader = ConfigLoader::new(temp_dir.path());
        assert_eq!(loader.load_rules("array.json").unwrap().len(), 1);
        assert_eq!(loader.load_rules("object.json").unwrap().len(), 1);
        assert!(loader.load_rules("missing.json").is_err());
    }

    #[test]
    fn test_unsupported_rule_format() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("rules.yaml"), "rules: []").unwrap();
        let loader = ConfigLoader::new(temp_dir.path());
        assert!(loader.load_rules("rules.yaml").is_err());
    }

    #[test]
    fn test_configured_rules_override_defaults() {
        let temp_dir = tempdir().unwrap();
        fs::write(
            temp_dir.path().join("rules.json"),
            r#"[{
                "kind": "performance",
                "id": "perf-cpu",
                "name": "CPU (tuned)",
                "metric": "cpu",
                "condition": "gt",
                "threshold": 95.0,
                "severity": "critical"
            }]"#,
        )
        .unwrap();

        let loader = ConfigLoader::new(temp_dir.path());
        let mut global = GlobalConfig::default();
        let defaults = loader.load_configured_rules(&global).unwrap();

        global.rules.file = Some(PathBuf::from("rules.json"));
        let merged = loader.load_configured_rules(&global).unwrap();
        assert_eq!(merged.len(), defaults.len());

        let cpu = merged.iter().find(|r| r.id() == "perf-cpu").unwrap();
        assert_eq!(cpu.as_alert_rule().threshold(), 95.0);
    }
}
