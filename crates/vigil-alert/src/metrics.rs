use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use vigil_notify::{DeliveryStatus, DispatchReport};

/// 引擎自身运行指标
pub struct EngineMetrics {
    // 告警生命周期
    alerts_triggered_total: IntCounterVec,
    alerts_resolved_total: IntCounterVec,
    active_alerts: IntGauge,

    // 求值
    rules_skipped_total: IntCounter,
    triggers_suppressed_total: IntCounter,
    cycle_duration: Histogram,

    // 通知
    notifications_total: IntCounterVec,
    escalations_total: IntCounter,

    registry: Registry,
}

impl EngineMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let alerts_triggered_total = IntCounterVec::new(
            Opts::new("vigil_alerts_triggered_total", "Total number of alerts triggered"),
            &["severity", "kind"],
        )?;
        registry.register(Box::new(alerts_triggered_total.clone()))?;

        let alerts_resolved_total = IntCounterVec::new(
            Opts::new("vigil_alerts_resolved_total", "Total number of alerts resolved"),
            &["reason"],
        )?;
        registry.register(Box::new(alerts_resolved_total.clone()))?;

        let active_alerts = IntGauge::new("vigil_active_alerts", "Number of active alerts")?;
        registry.register(Box::new(active_alerts.clone()))?;

        let rules_skipped_total = IntCounter::new(
            "vigil_rules_skipped_total",
            "Rule evaluations skipped for missing data",
        )?;
        registry.register(Box::new(rules_skipped_total.clone()))?;

        let triggers_suppressed_total = IntCounter::new(
            "vigil_triggers_suppressed_total",
            "Triggers suppressed by cooldown",
        )?;
        registry.register(Box::new(triggers_suppressed_total.clone()))?;

        let cycle_duration = Histogram::with_opts(
            HistogramOpts::new("vigil_cycle_duration_seconds", "Evaluation cycle duration")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 15.0]),
        )?;
        registry.register(Box::new(cycle_duration.clone()))?;

        let notifications_total = IntCounterVec::new(
            Opts::new("vigil_notifications_total", "Channel deliveries by outcome"),
            &["channel", "status"],
        )?;
        registry.register(Box::new(notifications_total.clone()))?;

        let escalations_total =
            IntCounter::new("vigil_escalations_total", "Escalation levels fired")?;
        registry.register(Box::new(escalations_total.clone()))?;

        Ok(Self {
            alerts_triggered_total,
            alerts_resolved_total,
            active_alerts,
            rules_skipped_total,
            triggers_suppressed_total,
            cycle_duration,
            notifications_total,
            escalations_total,
            registry,
        })
    }

    pub fn record_triggered(&self, severity: &str, kind: &str) {
        self.alerts_triggered_total
            .with_label_values(&[severity, kind])
            .inc();
    }

    pub fn record_resolved(&self, reason: &str) {
        self.alerts_resolved_total.with_label_values(&[reason]).inc();
    }

    pub fn set_active_alerts(&self, count: usize) {
        self.active_alerts.set(count as i64);
    }

    pub fn record_evaluation(&self, skipped: usize, suppressed: usize, duration_secs: f64) {
        self.rules_skipped_total.inc_by(skipped as u64);
        self.triggers_suppressed_total.inc_by(suppressed as u64);
        self.cycle_duration.observe(duration_secs);
    }

    pub fn record_dispatch(&self, report: &DispatchReport) {
        for outcome in &report.outcomes {
            let status = match outcome.status {
                DeliveryStatus::Delivered => "delivered",
                DeliveryStatus::Failed(_) => "failed",
                DeliveryStatus::TimedOut => "timed_out",
            };
            self.notifications_total
                .with_label_values(&[outcome.kind.as_str(), status])
                .inc();
        }
    }

    pub fn record_escalation(&self) {
        self.escalations_total.inc();
    }

    /// 导出 Prometheus 文本格式
    pub fn export(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
