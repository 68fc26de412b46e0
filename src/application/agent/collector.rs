//! Agent-side metric collection
//!
//! Polling refreshes the latest gauge readings and bumps `PollCount`;
//! reporting takes everything collected so far. `PollCount` is reported as the
//! number of polls since the previous report, so the collector's counter
//! accumulation yields the total number of polls.

use crate::domain::metric::{Metric, MetricValue};
use crate::infrastructure::system_stats::{HostSample, SystemStats};
use std::collections::BTreeMap;
use tracing::{debug, warn};

pub const POLL_COUNT: &str = "PollCount";
pub const RANDOM_VALUE: &str = "RandomValue";

pub struct MetricsCollector {
    stats: SystemStats,
    gauges: BTreeMap<String, f64>,
    polls_since_report: i64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            stats: SystemStats::new(),
            gauges: BTreeMap::new(),
            polls_since_report: 0,
        }
    }

    pub fn poll(&mut self) {
        let sample = self.stats.sample();
        self.record_sample(&sample);
        self.gauges
            .insert(RANDOM_VALUE.to_string(), rand::random::<f64>());
        self.polls_since_report += 1;
        debug!("Polled {} gauges", self.gauges.len());
    }

    fn record_sample(&mut self, sample: &HostSample) {
        let readings = [
            ("TotalMemory", sample.total_memory as f64),
            ("FreeMemory", sample.free_memory as f64),
            ("AvailableMemory", sample.available_memory as f64),
            ("UsedMemory", sample.used_memory as f64),
            ("TotalSwap", sample.total_swap as f64),
            ("UsedSwap", sample.used_swap as f64),
            ("ProcessResidentMemory", sample.process_resident_memory as f64),
            ("ProcessVirtualMemory", sample.process_virtual_memory as f64),
            ("ProcessCPUUsage", sample.process_cpu_usage as f64),
        ];
        for (name, value) in readings {
            self.gauges.insert(name.to_string(), value);
        }
        for (index, usage) in sample.cpu_utilization.iter().enumerate() {
            self.gauges
                .insert(format!("CPUutilization{}", index + 1), *usage as f64);
        }
    }

    /// Metrics to send for this report; resets the poll counter
    pub fn take_report(&mut self) -> Vec<Metric> {
        let mut metrics = Vec::with_capacity(self.gauges.len() + 1);
        for (name, value) in &self.gauges {
            match Metric::gauge(name.clone(), *value) {
                Ok(metric) => metrics.push(metric),
                Err(e) => warn!("Skipping gauge {}: {}", name, e),
            }
        }
        if let Ok(poll_count) = Metric::counter(POLL_COUNT, self.polls_since_report) {
            metrics.push(poll_count);
        }
        self.polls_since_report = 0;
        metrics
    }
}

impl MetricsCollector {
    /// Fold the `PollCount` delta of a report that never reached the
    /// collector back into the next one. Gauges are not restored; the next
    /// report carries fresher readings.
    pub fn restore_unsent(&mut self, report: &[Metric]) {
        for metric in report.iter().filter(|m| m.name == POLL_COUNT) {
            if let MetricValue::Counter(delta) = metric.value {
                self.polls_since_report = self.polls_since_report.saturating_add(delta);
            }
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
