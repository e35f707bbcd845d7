//! Named timing metrics around manager updates.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Rolling statistics for one metric, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metric {
    pub count: u64,
    pub total: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for Metric {
    fn default() -> Self {
        Self {
            count: 0,
            total: 0.0,
            min: f64::MAX,
            max: 0.0,
        }
    }
}

impl Metric {
    pub fn record(&mut self, value: f64) {
        self.count += 1;
        self.total += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn average(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total / self.count as f64
        }
    }
}

/// Session-long profiler; recording is a no-op while disabled.
#[derive(Debug, Default)]
pub struct Optimizer {
    metrics: BTreeMap<String, Metric>,
    enabled: bool,
}

impl Optimizer {
    pub fn new(enabled: bool) -> Self {
        Self {
            metrics: BTreeMap::new(),
            enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Record one sample under `name`.
    pub fn record(&mut self, name: &str, value: f64) {
        if !self.enabled {
            return;
        }
        self.metrics.entry(name.to_string()).or_default().record(value);
    }

    pub fn record_duration(&mut self, name: &str, elapsed: Duration) {
        self.record(name, elapsed.as_secs_f64() * 1000.0);
    }

    /// Run `f`, timing it under `name` when enabled.
    pub fn measure<T>(&mut self, name: &str, f: impl FnOnce() -> T) -> T {
        if !self.enabled {
            return f();
        }
        let start = Instant::now();
        let out = f();
        self.record_duration(name, start.elapsed());
        out
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    pub fn metrics(&self) -> impl Iterator<Item = (&String, &Metric)> {
        self.metrics.iter()
    }

    pub fn reset(&mut self) {
        self.metrics.clear();
    }

    /// One line per metric, slowest average first.
    pub fn report(&self) -> Vec<String> {
        let mut rows: Vec<_> = self.metrics.iter().collect();
        rows.sort_by(|a, b| b.1.average().total_cmp(&a.1.average()));
        rows.into_iter()
            .map(|(name, m)| {
                format!(
                    "{:<12} n={:<6} avg={:.3}ms min={:.3}ms max={:.3}ms",
                    name,
                    m.count,
                    m.average(),
                    m.min,
                    m.max
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_statistics() {
        let mut opt = Optimizer::new(true);
        opt.record("world", 2.0);
        opt.record("world", 4.0);
        opt.record("world", 6.0);
        let m = opt.metric("world").unwrap();
        assert_eq!(m.count, 3);
        assert_eq!(m.min, 2.0);
        assert_eq!(m.max, 6.0);
        assert!((m.average() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_disabled_records_nothing() {
        let mut opt = Optimizer::new(false);
        opt.record("world", 1.0);
        let v = opt.measure("settlement", || 7);
        assert_eq!(v, 7);
        assert!(opt.metric("world").is_none());
        assert!(opt.metric("settlement").is_none());
    }

    #[test]
    fn test_measure_counts_calls() {
        let mut opt = Optimizer::new(true);
        for _ in 0..3 {
            opt.measure("tick", || ());
        }
        assert_eq!(opt.metric("tick").unwrap().count, 3);
        assert_eq!(opt.report().len(), 1);
    }
}
