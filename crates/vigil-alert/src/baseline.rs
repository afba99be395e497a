use crate::rule::ComparisonPeriod;
use vigil_types::RuleKind;
use dashmap::DashMap;
use std::collections::VecDeque;

/// 默认基线窗口（样本数）
pub const DEFAULT_BASELINE_WINDOW: usize = 168;

/// 基线追踪器
///
/// 每个指标一个有界序列，超出窗口时淘汰最旧样本。
/// 按指标键加锁（DashMap 分片），不同指标的写入互不阻塞。
pub struct BaselineTracker {
    window: usize,
    series: DashMap<String, VecDeque<f64>>,
}

/// 序列键：`"{kind}:{metric}"`，性能指标与业务路径同名时互不干扰
pub fn series_key(kind: RuleKind, metric: &str) -> String {
    format!("{}:{}", kind, metric)
}

impl BaselineTracker {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            series: DashMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// 追加样本，非有限值直接丢弃
    pub fn record(&self, metric: &str, value: f64) {
        if !value.is_finite() {
            return;
        }

        let mut series = self
            .series
            .entry(metric.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.window));
        series.push_back(value);
        while series.len() > self.window {
            series.pop_front();
        }
    }

    /// 最近 `min(len, period 样本数)` 个样本的均值；没有数据时返回 `None`
    pub fn average(&self, metric: &str, period: ComparisonPeriod) -> Option<f64> {
        let series = self.series.get(metric)?;
        if series.is_empty() {
            return None;
        }

        let k = period.sample_count().min(series.len());
        let sum: f64 = series.iter().rev().take(k).sum();
        Some(sum / k as f64)
    }

    pub fn record_for(&self, kind: RuleKind, metric: &str, value: f64) {
        self.record(&series_key(kind, metric), value);
    }

    pub fn average_for(&self, kind: RuleKind, metric: &str, period: ComparisonPeriod) -> Option<f64> {
        self.average(&series_key(kind, metric), period)
    }

    pub fn len(&self, metric: &str) -> usize {
        self.series.get(metric).map(|s| s.len()).unwrap_or(0)
    }

    pub fn metric_count(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

impl Default for BaselineTracker {
    fn default() -> Self {
        Self::new(DEFAULT_BASELINE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_data_has_no_average() {
        let tracker = BaselineTracker::default();
        assert_eq!(tracker.average("financial.runway", ComparisonPeriod::Day), None);
        assert_eq!(tracker.len("financial.runway"), 0);
    }

    #[test]
    fn test_window_is_bounded() {
        let tracker = BaselineTracker::new(168);
        for i in 0..500 {
            tracker.record("cpu", i as f64);
        }

        assert_eq!(tracker.len("cpu"), 168);
        // 只保留最近 168 个样本：332..=499
        let expected = (332..500).sum::<i32>() as f64 / 168.0;
        let avg = tracker.average("cpu", ComparisonPeriod::Month).unwrap();
        assert!((avg - expected).abs() < 1e-9);
    }

    #[test]
    fn test_period_selects_recent_samples() {
        let tracker = BaselineTracker::new(168);
        for _ in 0..24 {
            tracker.record("revenue.mrr", 100.0);
        }
        tracker.record("revenue.mrr", 200.0);

        assert_eq!(tracker.average("revenue.mrr", ComparisonPeriod::Hour), Some(200.0));
        let day = tracker.average("revenue.mrr", ComparisonPeriod::Day).unwrap();
        assert!((day - (23.0 * 100.0 + 200.0) / 24.0).abs() < 1e-9);
        // 周期样本数超过序列长度时按实际长度计算
        let week = tracker.average("revenue.mrr", ComparisonPeriod::Week).unwrap();
        assert!((week - (24.0 * 100.0 + 200.0) / 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_values_are_ignored() {
        let tracker = BaselineTracker::default();
        tracker.record("throughput", f64::NAN);
        tracker.record("throughput", f64::INFINITY);
        assert_eq!(tracker.len("throughput"), 0);
    }

    #[test]
    fn test_kinds_use_separate_series() {
        let tracker = BaselineTracker::new(10);
        tracker.record_for(RuleKind::Performance, "cpu", 90.0);
        tracker.record_for(RuleKind::Business, "cpu", 10.0);

        assert_eq!(
            tracker.average_for(RuleKind::Performance, "cpu", ComparisonPeriod::Day),
            Some(90.0)
        );
        assert_eq!(
            tracker.average_for(RuleKind::Business, "cpu", ComparisonPeriod::Day),
            Some(10.0)
        );
        assert_eq!(tracker.metric_count(), 2);
    }
}
