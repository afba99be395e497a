pub mod analytics;
pub mod baseline;
pub mod cooldown;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod escalation;
pub mod evaluator;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod rule;
pub mod snapshot;
pub mod store;

pub use analytics::{AlertAnalytics, RuleFrequency};
pub use baseline::{series_key, BaselineTracker};
pub use cooldown::CooldownRegistry;
pub use defaults::default_rules;
pub use engine::{AlertEngine, AlertEngineBuilder, CycleReport, EngineHandle, EngineSettings};
pub use error::{AlertError, Result};
pub use escalation::{
    EscalationFire, EscalationLevel, EscalationPolicy, EscalationScheduler, EscalationState,
};
pub use evaluator::{Evaluation, RuleEvaluator, TriggerEvent};
pub use metrics::EngineMetrics;
pub use provider::{
    BusinessMetricsProvider, HttpMetricsProvider, PerformanceMetricsProvider, StaticMetricsProvider,
};
pub use registry::AlertRegistry;
pub use rule::{
    AlertRule, BusinessRule, ComparisonPeriod, Condition, EvaluationInput, Observation,
    PerformanceMetric, PerformanceRule, Rule, RulePatch,
};
pub use snapshot::{BusinessSnapshot, PerformanceSnapshot};
pub use store::RuleStore;

pub use vigil_types::{Alert, AlertContext, ChannelKind, RuleKind, Severity};
