use crate::rule::PerformanceMetric;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vigil_types::AlertContext;

/// 性能指标快照：指标名 -> 数值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PerformanceSnapshot {
    values: BTreeMap<String, f64>,
}

impl PerformanceSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: PerformanceMetric, value: f64) -> Self {
        self.set(metric, value);
        self
    }

    pub fn set(&mut self, metric: PerformanceMetric, value: f64) {
        self.values.insert(metric.as_str().to_string(), value);
    }

    pub fn get(&self, metric: PerformanceMetric) -> Option<f64> {
        self.values.get(metric.as_str()).copied().filter(|v| v.is_finite())
    }

    /// 从任意 JSON 对象中提取顶层数值字段
    pub fn from_json(value: &serde_json::Value) -> Self {
        let values = value
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_f64().map(|n| (k.clone(), n)))
                    .collect()
            })
            .unwrap_or_default();
        Self { values }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn to_context(&self) -> AlertContext {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::json!(v)))
            .collect()
    }
}

/// 业务指标快照：嵌套结构，按点分路径寻址（如 `revenue.monthlyRecurringRevenue`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BusinessSnapshot {
    root: serde_json::Value,
}

impl BusinessSnapshot {
    pub fn new(root: serde_json::Value) -> Self {
        Self { root }
    }

    /// 解析点分路径；任一段缺失或叶子不是数值都返回 `None`
    pub fn resolve(&self, path: &str) -> Option<f64> {
        let mut current = &self.root;
        for segment in path.split('.') {
            current = current.as_object()?.get(segment)?;
        }
        current.as_f64()
    }

    /// 所有数值叶子节点（用于基线记录）
    pub fn numeric_leaves(&self) -> Vec<(String, f64)> {
        let mut leaves = Vec::new();
        collect_leaves(&self.root, String::new(), &mut leaves);
        leaves
    }

    pub fn is_empty(&self) -> bool {
        match &self.root {
            serde_json::Value::Null => true,
            serde_json::Value::Object(obj) => obj.is_empty(),
            _ => false,
        }
    }
}

fn collect_leaves(value: &serde_json::Value, prefix: String, out: &mut Vec<(String, f64)>) {
    match value {
        serde_json::Value::Object(obj) => {
            for (k, v) in obj {
                let path = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                collect_leaves(v, path, out);
            }
        }
        serde_json::Value::Number(n) if !prefix.is_empty() => {
            if let Some(v) = n.as_f64() {
                out.push((prefix, v));
            }
        }
        _ => {}
    }
}
