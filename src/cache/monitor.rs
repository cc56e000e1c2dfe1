//! Query latency monitor.
//!
//! Keeps the most recent samples per query kind in a bounded ring buffer and
//! flags any single sample slower than the configured threshold.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use metrics::{counter, histogram};
use serde::Serialize;
use tracing::warn;

const METRIC_QUERY_DURATION: &str = "postpilot_query_duration_ms";
const METRIC_QUERY_SLOW: &str = "postpilot_query_slow_total";

pub const DEFAULT_SAMPLE_CAPACITY: usize = 100;
pub const DEFAULT_SLOW_QUERY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug)]
pub struct QueryMonitor {
    samples: DashMap<String, VecDeque<f64>>,
    capacity: usize,
    slow_threshold: Duration,
}

impl Default for QueryMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_CAPACITY, DEFAULT_SLOW_QUERY)
    }
}

impl QueryMonitor {
    pub fn new(capacity: usize, slow_threshold: Duration) -> Self {
        Self {
            samples: DashMap::new(),
            capacity: capacity.max(1),
            slow_threshold,
        }
    }

    /// Start timing one execution of `kind`.
    pub fn start_timer(&self, kind: &str) -> QueryTimer<'_> {
        QueryTimer {
            monitor: self,
            kind: kind.to_string(),
            started: Instant::now(),
        }
    }

    /// Record a sample, evicting the oldest beyond capacity.
    pub fn record(&self, kind: &str, elapsed: Duration) {
        let elapsed_ms = elapsed.as_secs_f64() * 1000.0;

        {
            let mut samples = self.samples.entry(kind.to_string()).or_default();
            if samples.len() == self.capacity {
                samples.pop_front();
            }
            samples.push_back(elapsed_ms);
        }

        histogram!(METRIC_QUERY_DURATION, "kind" => kind.to_string()).record(elapsed_ms);
        if elapsed > self.slow_threshold {
            counter!(METRIC_QUERY_SLOW, "kind" => kind.to_string()).increment(1);
            warn!(
                query_kind = %kind,
                elapsed_ms,
                threshold_ms = self.slow_threshold.as_millis() as u64,
                "Slow query"
            );
        }
    }

    pub fn stats(&self, kind: &str) -> Option<QueryStats> {
        let samples = self.samples.get(kind)?;
        summarize(&samples)
    }

    /// Stats for every kind with at least one sample, sorted by kind.
    pub fn all_stats(&self) -> Vec<(String, QueryStats)> {
        let mut all: Vec<(String, QueryStats)> = self
            .samples
            .iter()
            .filter_map(|entry| summarize(entry.value()).map(|stats| (entry.key().clone(), stats)))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn reset(&self) {
        self.samples.clear();
    }
}

fn summarize(samples: &VecDeque<f64>) -> Option<QueryStats> {
    if samples.is_empty() {
        return None;
    }
    let (sum, min, max) = samples.iter().fold(
        (0.0, f64::INFINITY, f64::NEG_INFINITY),
        |(sum, min, max), &sample| (sum + sample, min.min(sample), max.max(sample)),
    );
    Some(QueryStats {
        avg: sum / samples.len() as f64,
        min,
        max,
        count: samples.len(),
    })
}

/// Running timer; [`stop`](Self::stop) records the sample.
#[must_use = "a timer records nothing until stopped"]
pub struct QueryTimer<'a> {
    monitor: &'a QueryMonitor,
    kind: String,
    started: Instant,
}

impl QueryTimer<'_> {
    pub fn stop(self) -> Duration {
        let elapsed = self.started.elapsed();
        self.monitor.record(&self.kind, elapsed);
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_summarize_samples() {
        let monitor = QueryMonitor::default();
        for ms in [10, 20, 30] {
            monitor.record("q", Duration::from_millis(ms));
        }

        let stats = monitor.stats("q").expect("stats");
        assert_eq!(stats.count, 3);
        assert!((stats.avg - 20.0).abs() < 1e-9);
        assert!((stats.min - 10.0).abs() < 1e-9);
        assert!((stats.max - 30.0).abs() < 1e-9);
        assert!(monitor.stats("other").is_none());
    }

    #[test]
    fn ring_buffer_drops_oldest() {
        let monitor = QueryMonitor::new(2, DEFAULT_SLOW_QUERY);
        for ms in [100, 1, 2] {
            monitor.record("q", Duration::from_millis(ms));
        }
        let stats = monitor.stats("q").expect("stats");
        assert_eq!(stats.count, 2);
        assert!((stats.max - 2.0).abs() < 1e-9);
    }

    #[test]
    fn timer_records_on_stop() {
        let monitor = QueryMonitor::default();
        let timer = monitor.start_timer("user.profile");
        timer.stop();
        let all = monitor.all_stats();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].0, "user.profile");
        assert_eq!(all[0].1.count, 1);
    }
}
