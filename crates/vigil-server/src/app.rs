use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use vigil_alert::{AlertEngine, HttpMetricsProvider};
use vigil_config::{ConfigLoader, GlobalConfig};
use vigil_notify::{build_notifier, NotifyManager};

/// 根据全局配置组装告警引擎
///
/// 数据源地址未配置时对应的规则在每个周期都会被跳过。
pub async fn build_engine(loader: &ConfigLoader, config: &GlobalConfig) -> Result<AlertEngine> {
    let notifier = Arc::new(NotifyManager::new(config.engine.channel_timeout()));
    for channel in &config.channels {
        notifier.register(build_notifier(channel)).await;
    }
    if config.channels.is_empty() {
        warn!("No notification channels configured, alerts will only be recorded");
    }

    let mut builder = AlertEngine::builder()
        .with_settings(config.engine.to_settings())
        .with_notifier(notifier);

    let provider_timeout = Duration::from_secs(config.providers.request_timeout_secs);
    if let Some(url) = &config.providers.performance_url {
        let provider = HttpMetricsProvider::new(url.clone(), provider_timeout)
            .with_context(|| format!("Failed to create performance provider for {url}"))?;
        builder = builder.with_performance_provider(Arc::new(provider));
    }
    if let Some(url) = &config.providers.business_url {
        let provider = HttpMetricsProvider::new(url.clone(), provider_timeout)
            .with_context(|| format!("Failed to create business provider for {url}"))?;
        builder = builder.with_business_provider(Arc::new(provider));
    }

    for binding in &config.escalation {
        builder = builder.with_escalation_policy(binding.severity, binding.policy.clone());
    }

    let engine = builder.build()?;

    let rules = loader.load_configured_rules(config)?;
    let count = rules.len();
    for rule in rules {
        let id = rule.id().to_string();
        engine
            .add_rule(rule)
            .await
            .with_context(|| format!("Failed to register rule {id}"))?;
    }

    info!(
        rules = count,
        channels = config.channels.len(),
        escalation_policies = config.escalation.len(),
        "Alert engine assembled"
    );
    Ok(engine)
}
