use crate::analytics::{AlertAnalytics, DEFAULT_ANALYTICS_WINDOW_DAYS};
use crate::baseline::{BaselineTracker, DEFAULT_BASELINE_WINDOW};
use crate::cooldown::CooldownRegistry;
use crate::error::Result;
use crate::escalation::{EscalationPolicy, EscalationScheduler};
use crate::evaluator::RuleEvaluator;
use crate::metrics::EngineMetrics;
use crate::provider::{BusinessMetricsProvider, PerformanceMetricsProvider};
use crate::registry::{AlertRegistry, DEFAULT_HISTORY_LIMIT};
use crate::rule::{EvaluationInput, Rule, RulePatch};
use crate::snapshot::{BusinessSnapshot, PerformanceSnapshot};
use crate::store::RuleStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use vigil_notify::{DispatchReport, NotifyManager, NotifyMessage};
use vigil_types::{Alert, RuleKind, Severity};

/// 引擎运行参数
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// 求值周期
    pub evaluation_interval: Duration,

    /// 升级检查周期
    pub escalation_check_interval: Duration,

    pub baseline_window: usize,
    pub history_limit: usize,

    /// 规则停止越限后多久自动恢复
    pub auto_resolve_minutes: u32,

    pub analytics_window_days: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            evaluation_interval: Duration::from_secs(120),
            escalation_check_interval: Duration::from_secs(30),
            baseline_window: DEFAULT_BASELINE_WINDOW,
            history_limit: DEFAULT_HISTORY_LIMIT,
            auto_resolve_minutes: 60,
            analytics_window_days: DEFAULT_ANALYTICS_WINDOW_DAYS,
        }
    }
}

/// 一轮求值的结果
#[derive(Debug, Default, Serialize)]
pub struct CycleReport {
    pub triggered: Vec<Alert>,
    pub resolved: Vec<Alert>,
    pub escalations: usize,
    pub skipped: usize,
    pub suppressed: usize,
}

/// 告警引擎
///
/// 持有全部运行状态（规则、基线、冷却、活跃告警、升级），
/// 通过 `Arc<AlertEngine>` 在后台任务和调用方之间共享。
pub struct AlertEngine {
    settings: EngineSettings,
    rules: RuleStore,
    baselines: BaselineTracker,
    evaluator: RuleEvaluator,
    registry: AlertRegistry,
    escalation: EscalationScheduler,
    policies: HashMap<Severity, EscalationPolicy>,
    performance: Option<Arc<dyn PerformanceMetricsProvider>>,
    business: Option<Arc<dyn BusinessMetricsProvider>>,
    notifier: Arc<NotifyManager>,
    metrics: EngineMetrics,

    /// 串行化求值周期
    cycle_lock: Mutex<()>,
}

impl AlertEngine {
    pub fn builder() -> AlertEngineBuilder {
        AlertEngineBuilder::new()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn baselines(&self) -> &BaselineTracker {
        &self.baselines
    }

    pub fn notifier(&self) -> &Arc<NotifyManager> {
        &self.notifier
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    // ========== 求值 ==========

    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// 执行一轮求值：取快照 -> 求值 -> 记录基线 -> 登记/通知 -> 自动恢复 -> 升级
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        let _guard = self.cycle_lock.lock().await;
        let started = Instant::now();

        let performance = self.fetch_performance().await;
        let business = self.fetch_business().await;
        let rules = self.rules.list_enabled().await;

        let evaluation = {
            let input = EvaluationInput {
                performance: performance.as_ref(),
                business: business.as_ref(),
                baselines: &self.baselines,
            };
            self.evaluator.evaluate(&input, &rules, now)
        };

        // 基线在求值之后记录，本轮数据只影响之后的周期
        self.record_baselines(performance.as_ref(), business.as_ref());

        let mut report = CycleReport {
            skipped: evaluation.skipped,
            suppressed: evaluation.suppressed,
            ..Default::default()
        };

        for trigger in evaluation.triggers {
            let alert = trigger.into_alert();
            self.metrics
                .record_triggered(alert.severity.as_str(), alert.rule_kind.as_str());
            self.registry.insert(alert.clone()).await;

            if let Some(policy) = self.policies.get(&alert.severity) {
                self.escalation.arm(&alert.id, policy, now).await;
            }

            self.notify(&NotifyMessage::triggered(&alert)).await;
            report.triggered.push(alert);
        }

        self.registry.touch(&evaluation.breaching, now).await;
        let stale = self
            .registry
            .sweep_stale(&evaluation.breaching, now, self.settings.auto_resolve_minutes)
            .await;
        for alert in stale {
            self.escalation.cancel(&alert.id).await;
            self.metrics.record_resolved("auto");
            self.notify(&NotifyMessage::resolved(&alert)).await;
            report.resolved.push(alert);
        }

        report.escalations = self.process_escalations_at(now).await;

        let active = self.registry.active_count().await;
        self.metrics.set_active_alerts(active);
        self.metrics.record_evaluation(
            report.skipped,
            report.suppressed,
            started.elapsed().as_secs_f64(),
        );

        info!(
            rules = rules.len(),
            triggered = report.triggered.len(),
            resolved = report.resolved.len(),
            escalations = report.escalations,
            skipped = report.skipped,
            suppressed = report.suppressed,
            active,
            "Evaluation cycle complete"
        );
        report
    }

    /// 发送所有到期的升级通知，返回发送的级别数
    pub async fn process_escalations_at(&self, now: DateTime<Utc>) -> usize {
        let mut fired = 0;
        for fire in self.escalation.due(now).await {
            let Some(alert) = self.registry.get_active(&fire.alert_id).await else {
                self.escalation.cancel(&fire.alert_id).await;
                continue;
            };
            // 前一个级别发送期间可能已被确认
            if alert.is_acknowledged() {
                debug!(alert_id = %fire.alert_id, level = fire.level, "Alert acknowledged, dropping escalation");
                self.escalation.cancel(&fire.alert_id).await;
                continue;
            }

            let message = NotifyMessage::escalation(&alert, fire.level, fire.recipients, now);
            let report = self.notifier.dispatch_to(&fire.channels, &message).await;
            self.metrics.record_dispatch(&report);
            self.metrics.record_escalation();
            fired += 1;
        }

        self.escalation.purge_finished().await;
        fired
    }

    async fn fetch_performance(&self) -> Option<PerformanceSnapshot> {
        let provider = self.performance.as_ref()?;
        match provider.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Performance metrics unavailable, skipping performance rules");
                None
            }
        }
    }

    async fn fetch_business(&self) -> Option<BusinessSnapshot> {
        let provider = self.business.as_ref()?;
        match provider.snapshot().await {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!(error = %e, "Business metrics unavailable, skipping business rules");
                None
            }
        }
    }

    fn record_baselines(
        &self,
        performance: Option<&PerformanceSnapshot>,
        business: Option<&BusinessSnapshot>,
    ) {
        if let Some(snapshot) = performance {
            for (metric, value) in snapshot.iter() {
                self.baselines.record_for(RuleKind::Performance, metric, value);
            }
        }
        if let Some(snapshot) = business {
            for (path, value) in snapshot.numeric_leaves() {
                self.baselines.record_for(RuleKind::Business, &path, value);
            }
        }
    }

    async fn notify(&self, message: &NotifyMessage) -> DispatchReport {
        let report = self.notifier.dispatch(message).await;
        self.metrics.record_dispatch(&report);
        if !report.is_empty() && !report.all_delivered() {
            debug!(
                alert_id = %message.alert.id,
                failed = report.failures().len(),
                "Notification partially delivered"
            );
        }
        report
    }

    // ========== 告警生命周期 ==========

    pub async fn acknowledge(&self, alert_id: &str, by: &str) -> bool {
        self.acknowledge_at(alert_id, by, Utc::now()).await
    }

    /// 确认告警并取消其升级
    pub async fn acknowledge_at(&self, alert_id: &str, by: &str, now: DateTime<Utc>) -> bool {
        if !self.registry.acknowledge(alert_id, by, now).await {
            return false;
        }
        self.escalation.cancel(alert_id).await;
        true
    }

    pub async fn resolve(&self, alert_id: &str, by: Option<&str>) -> bool {
        self.resolve_at(alert_id, by, Utc::now()).await
    }

    /// 手动恢复；已恢复或不存在的告警返回 `false` 且不再发送通知
    pub async fn resolve_at(&self, alert_id: &str, by: Option<&str>, now: DateTime<Utc>) -> bool {
        let Some(alert) = self
            .registry
            .resolve(alert_id, by.map(str::to_string), now)
            .await
        else {
            return false;
        };

        self.escalation.cancel(alert_id).await;
        self.metrics.record_resolved("manual");
        self.metrics.set_active_alerts(self.registry.active_count().await);
        self.notify(&NotifyMessage::resolved(&alert)).await;
        true
    }

    // ========== 规则管理 ==========

    pub async fn add_rule(&self, rule: Rule) -> Result<()> {
        self.rules.add(rule).await
    }

    /// 更新规则；不存在时返回 `Ok(false)`
    pub async fn update_rule(&self, rule_id: &str, patch: RulePatch) -> Result<bool> {
        match self.rules.update(rule_id, &patch).await? {
            Some(rule) => {
                self.evaluator.reset_streak(&rule);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn remove_rule(&self, rule_id: &str) -> bool {
        match self.rules.remove(rule_id).await {
            Some(rule) => {
                self.evaluator.forget(&rule);
                true
            }
            None => false,
        }
    }

    // ========== 查询 ==========

    pub async fn get_active_alerts(&self) -> Vec<Alert> {
        self.registry.active_alerts().await
    }

    pub async fn get_alert_history(&self, hours: u32) -> Vec<Alert> {
        self.registry.history(hours, Utc::now()).await
    }

    pub async fn get_rules(&self) -> Vec<Rule> {
        self.rules.list().await
    }

    pub async fn get_alert_analytics(&self) -> AlertAnalytics {
        self.alert_analytics_at(Utc::now()).await
    }

    pub async fn alert_analytics_at(&self, now: DateTime<Utc>) -> AlertAnalytics {
        let history = self.registry.history_snapshot().await;
        let active = self.registry.active_count().await;
        AlertAnalytics::compute(&history, active, now, self.settings.analytics_window_days)
    }

    // ========== 后台任务 ==========

    /// 启动求值循环与升级循环，收到关闭信号后退出
    pub fn start<S>(self: &Arc<Self>, shutdown: &broadcast::Receiver<S>) -> EngineHandle
    where
        S: Clone + Send + 'static,
    {
        let evaluation = {
            let engine = Arc::clone(self);
            let mut shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(engine.settings.evaluation_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                info!(
                    interval_secs = engine.settings.evaluation_interval.as_secs(),
                    "Evaluation loop started"
                );

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            engine.run_cycle().await;
                        }
                        _ = shutdown.recv() => {
                            info!("Evaluation loop stopped");
                            break;
                        }
                    }
                }
            })
        };

        let escalation = {
            let engine = Arc::clone(self);
            let mut shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(engine.settings.escalation_check_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            engine.process_escalations_at(Utc::now()).await;
                        }
                        _ = shutdown.recv() => {
                            info!("Escalation loop stopped");
                            break;
                        }
                    }
                }
            })
        };

        EngineHandle {
            evaluation,
            escalation,
        }
    }
}

/// 后台任务句柄
pub struct EngineHandle {
    evaluation: JoinHandle<()>,
    escalation: JoinHandle<()>,
}

impl EngineHandle {
    /// 等待后台任务退出
    pub async fn join(&mut self) {
        if let Err(e) = (&mut self.evaluation).await {
            error!(error = %e, "Evaluation loop terminated abnormally");
        }
        if let Err(e) = (&mut self.escalation).await {
            error!(error = %e, "Escalation loop terminated abnormally");
        }
    }

    pub fn abort(&self) {
        self.evaluation.abort();
        self.escalation.abort();
    }
}

/// 告警引擎构建器
pub struct AlertEngineBuilder {
    settings: EngineSettings,
    performance: Option<Arc<dyn PerformanceMetricsProvider>>,
    business: Option<Arc<dyn BusinessMetricsProvider>>,
    notifier: Option<Arc<NotifyManager>>,
    policies: HashMap<Severity, EscalationPolicy>,
}

impl AlertEngineBuilder {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::default(),
            performance: None,
            business: None,
            notifier: None,
            policies: HashMap::new(),
        }
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_performance_provider(mut self, provider: Arc<dyn PerformanceMetricsProvider>) -> Self {
        self.performance = Some(provider);
        self
    }

    pub fn with_business_provider(mut self, provider: Arc<dyn BusinessMetricsProvider>) -> Self {
        self.business = Some(provider);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<NotifyManager>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// 为某个级别的告警指定升级策略
    pub fn with_escalation_policy(mut self, severity: Severity, policy: EscalationPolicy) -> Self {
        self.policies.insert(severity, policy);
        self
    }

    pub fn build(self) -> Result<AlertEngine> {
        let metrics = EngineMetrics::new()?;
        let cooldowns = Arc::new(CooldownRegistry::new());

        Ok(AlertEngine {
            rules: RuleStore::new(),
            baselines: BaselineTracker::new(self.settings.baseline_window),
            evaluator: RuleEvaluator::new(cooldowns),
            registry: AlertRegistry::new(self.settings.history_limit),
            escalation: EscalationScheduler::new(),
            policies: self.policies,
            performance: self.performance,
            business: self.business,
            notifier: self.notifier.unwrap_or_default(),
            metrics,
            cycle_lock: Mutex::new(()),
            settings: self.settings,
        })
    }
}

impl Default for AlertEngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
