//! Metrics and health checks.
//!
//! Metric namespaces:
//! - `tessera.request.<kind>.*` - per lifecycle command kind
//! - `tessera.cache.*` - residency gauges and controller counters

use crate::cache::controller::CacheStats;
use crate::commands::CommandKind;
use crate::core::error::StatusCode;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

/// Health check result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Overall healthy state.
    pub healthy: bool,
    /// Status message.
    pub message: String,
}

impl HealthStatus {
    /// Create a healthy status.
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            message: "OK".to_string(),
        }
    }

    /// Create an unhealthy status.
    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            healthy: false,
            message: message.into(),
        }
    }
}

/// Metric names.
pub mod metrics {
    /// Requests per kind; `{kind}` is replaced with the command kind.
    pub const REQUEST_TOTAL: &str = "tessera.request.{kind}.total";
    /// Failed requests per kind.
    pub const REQUEST_ERRORS: &str = "tessera.request.{kind}.errors";
    /// Request latency histogram per kind.
    pub const REQUEST_LATENCY_MS: &str = "tessera.request.{kind}.latency_ms";
    /// Resident segment count gauge.
    pub const CACHE_RESIDENT_SEGMENTS: &str = "tessera.cache.resident_segments";
    /// Resident payload bytes gauge.
    pub const CACHE_USAGE_BYTES: &str = "tessera.cache.usage_bytes";
    /// Configured capacity gauge.
    pub const CACHE_CAPACITY_BYTES: &str = "tessera.cache.capacity_bytes";
    /// Segments held by forced loads gauge.
    pub const CACHE_HELD_SEGMENTS: &str = "tessera.cache.held_segments";
    /// Segments loaded by forced loads counter.
    pub const CACHE_FORCED_LOADS: &str = "tessera.cache.forced_loads";
    /// Segments removed by forced releases counter.
    pub const CACHE_FORCED_RELEASES: &str = "tessera.cache.forced_releases";
    /// Segments removed by ordinary eviction counter.
    pub const CACHE_EVICTIONS: &str = "tessera.cache.evictions";

    /// Expand a per-kind template.
    pub fn for_kind(template: &str, kind: &str) -> String {
        template.replace("{kind}", kind)
    }
}

/// Metrics registry.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: RwLock<HashMap<String, AtomicU64>>,
    gauges: RwLock<HashMap<String, AtomicU64>>,
    histograms: RwLock<HashMap<String, HistogramData>>,
}

impl MetricsRegistry {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter.
    pub fn counter_inc(&self, name: &str) {
        self.counter_add(name, 1);
    }

    /// Add to a counter.
    pub fn counter_add(&self, name: &str, value: u64) {
        let counters = self.counters.read();
        if let Some(counter) = counters.get(name) {
            counter.fetch_add(value, Ordering::Relaxed);
            return;
        }
        drop(counters);

        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(value, Ordering::Relaxed);
    }

    /// Raise a counter to `value` if it is lower.
    ///
    /// Used to mirror monotonic counters owned by another component.
    pub fn counter_set_max(&self, name: &str, value: u64) {
        let counters = self.counters.read();
        if let Some(counter) = counters.get(name) {
            counter.fetch_max(value, Ordering::Relaxed);
            return;
        }
        drop(counters);

        self.counters
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_max(value, Ordering::Relaxed);
    }

    /// Get counter value.
    pub fn counter_get(&self, name: &str) -> u64 {
        self.counters
            .read()
            .get(name)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Set a gauge value.
    pub fn gauge_set(&self, name: &str, value: u64) {
        let gauges = self.gauges.read();
        if let Some(gauge) = gauges.get(name) {
            gauge.store(value, Ordering::Relaxed);
            return;
        }
        drop(gauges);

        self.gauges
            .write()
            .entry(name.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .store(value, Ordering::Relaxed);
    }

    /// Get gauge value.
    pub fn gauge_get(&self, name: &str) -> u64 {
        self.gauges
            .read()
            .get(name)
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a histogram observation.
    pub fn histogram_observe(&self, name: &str, value: f64) {
        let histograms = self.histograms.read();
        if let Some(data) = histograms.get(name) {
            data.observe(value);
            return;
        }
        drop(histograms);

        self.histograms
            .write()
            .entry(name.to_string())
            .or_insert_with(HistogramData::new)
            .observe(value);
    }

    /// Get histogram data.
    pub fn histogram_get(&self, name: &str) -> Option<HistogramSnapshot> {
        self.histograms.read().get(name).map(|h| h.snapshot())
    }

    /// Get all counter names.
    pub fn counter_names(&self) -> Vec<String> {
        self.counters.read().keys().cloned().collect()
    }

    /// Get all gauge names.
    pub fn gauge_names(&self) -> Vec<String> {
        self.gauges.read().keys().cloned().collect()
    }

    /// Export metrics in Prometheus text format, sorted by name.
    pub fn export_prometheus(&self) -> String {
        let mut output = String::new();

        let counters: BTreeMap<String, u64> = self
            .counters
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        for (name, value) in counters {
            let prometheus_name = name.replace('.', "_");
            output.push_str(&format!(
                "# TYPE {prometheus_name} counter\n{prometheus_name} {value}\n"
            ));
        }

        let gauges: BTreeMap<String, u64> = self
            .gauges
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();
        for (name, value) in gauges {
            let prometheus_name = name.replace('.', "_");
            output.push_str(&format!(
                "# TYPE {prometheus_name} gauge\n{prometheus_name} {value}\n"
            ));
        }

        let histograms: BTreeMap<String, HistogramSnapshot> = self
            .histograms
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.snapshot()))
            .collect();
        for (name, snapshot) in histograms {
            let prometheus_name = name.replace('.', "_");
            output.push_str(&format!(
                "# TYPE {p} histogram\n{p}_count {}\n{p}_sum {}\n",
                snapshot.count,
                snapshot.sum,
                p = prometheus_name
            ));
        }

        output
    }
}

/// Histogram data storage.
#[derive(Debug)]
struct HistogramData {
    count: AtomicU64,
    // sum, min, max
    stats: Mutex<(f64, f64, f64)>,
}

impl HistogramData {
    fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            stats: Mutex::new((0.0, f64::MAX, f64::MIN)),
        }
    }

    fn observe(&self, value: f64) {
        let mut stats = self.stats.lock();
        self.count.fetch_add(1, Ordering::Relaxed);
        stats.0 += value;
        stats.1 = stats.1.min(value);
        stats.2 = stats.2.max(value);
    }

    fn snapshot(&self) -> HistogramSnapshot {
        let stats = self.stats.lock();
        HistogramSnapshot {
            count: self.count.load(Ordering::Relaxed),
            sum: stats.0,
            min: stats.1,
            max: stats.2,
        }
    }
}

/// Histogram snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramSnapshot {
    /// Number of observations.
    pub count: u64,
    /// Sum of all observations.
    pub sum: f64,
    /// Minimum value observed.
    pub min: f64,
    /// Maximum value observed.
    pub max: f64,
}

impl HistogramSnapshot {
    /// Calculate mean.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Tessera-specific metrics collector.
#[derive(Debug, Default)]
pub struct TesseraMetrics {
    registry: MetricsRegistry,
}

impl TesseraMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the underlying registry.
    pub fn registry(&self) -> &MetricsRegistry {
        &self.registry
    }

    /// Record one finished lifecycle request.
    pub fn record_request(&self, kind: CommandKind, code: StatusCode, latency_ms: f64) {
        let kind = kind.as_str();
        self.registry
            .counter_inc(&metrics::for_kind(metrics::REQUEST_TOTAL, kind));
        if code != StatusCode::Ok {
            self.registry
                .counter_inc(&metrics::for_kind(metrics::REQUEST_ERRORS, kind));
            let by_code = format!(
                "{}.{}",
                metrics::for_kind(metrics::REQUEST_ERRORS, kind),
                code.as_str()
            );
            self.registry.counter_inc(&by_code);
        }
        self.registry.histogram_observe(
            &metrics::for_kind(metrics::REQUEST_LATENCY_MS, kind),
            latency_ms,
        );
    }

    /// Mirror cache controller statistics.
    pub fn record_cache_stats(&self, stats: &CacheStats) {
        self.registry
            .gauge_set(metrics::CACHE_RESIDENT_SEGMENTS, stats.resident_segments as u64);
        self.registry
            .gauge_set(metrics::CACHE_USAGE_BYTES, stats.usage_bytes);
        self.registry
            .gauge_set(metrics::CACHE_CAPACITY_BYTES, stats.capacity_bytes);
        self.registry
            .gauge_set(metrics::CACHE_HELD_SEGMENTS, stats.held_segments as u64);
        self.registry
            .counter_set_max(metrics::CACHE_FORCED_LOADS, stats.forced_loads);
        self.registry
            .counter_set_max(metrics::CACHE_FORCED_RELEASES, stats.forced_releases);
        self.registry
            .counter_set_max(metrics::CACHE_EVICTIONS, stats.evictions);
    }

    /// Export all metrics.
    pub fn export(&self) -> String {
        self.registry.export_prometheus()
    }
}

/// Health probe handler.
#[derive(Debug)]
pub struct HealthProbe {
    status: RwLock<HealthStatus>,
}

impl HealthProbe {
    /// Create a new, healthy probe.
    pub fn new() -> Self {
        Self {
            status: RwLock::new(HealthStatus::healthy()),
        }
    }

    pub fn status(&self) -> HealthStatus {
        self.status.read().clone()
    }

    pub fn set_healthy(&self) {
        *self.status.write() = HealthStatus::healthy();
    }

    pub fn set_unhealthy(&self, message: impl Into<String>) {
        *self.status.write() = HealthStatus::unhealthy(message);
    }

    pub fn is_healthy(&self) -> bool {
        self.status.read().healthy
    }
}

impl Default for HealthProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registry_counters() {
        let registry = MetricsRegistry::new();

        registry.counter_inc("test.counter");
        assert_eq!(registry.counter_get("test.counter"), 1);

        registry.counter_add("test.counter", 5);
        assert_eq!(registry.counter_get("test.counter"), 6);

        registry.counter_set_max("test.counter", 3);
        assert_eq!(registry.counter_get("test.counter"), 6);
        registry.counter_set_max("test.counter", 9);
        assert_eq!(registry.counter_get("test.counter"), 9);
    }

    #[test]
    fn test_metrics_registry_histograms() {
        let registry = MetricsRegistry::new();

        registry.histogram_observe("test.histogram", 10.0);
        registry.histogram_observe("test.histogram", 20.0);
        registry.histogram_observe("test.histogram", 30.0);

        let snapshot = registry.histogram_get("test.histogram").unwrap();
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.sum, 60.0);
        assert_eq!(snapshot.min, 10.0);
        assert_eq!(snapshot.max, 30.0);
        assert_eq!(snapshot.mean(), 20.0);
    }

    #[test]
    fn test_request_metrics() {
        let metrics = TesseraMetrics::new();
        metrics.record_request(CommandKind::ReleaseCollection, StatusCode::Ok, 1.5);
        metrics.record_request(
            CommandKind::ReleaseCollection,
            StatusCode::CollectionNotFound,
            0.5,
        );

        let registry = metrics.registry();
        assert_eq!(registry.counter_get("tessera.request.release_collection.total"), 2);
        assert_eq!(registry.counter_get("tessera.request.release_collection.errors"), 1);
        assert_eq!(
            registry.counter_get("tessera.request.release_collection.errors.CollectionNotFound"),
            1
        );
        let latency = registry
            .histogram_get("tessera.request.release_collection.latency_ms")
            .unwrap();
        assert_eq!(latency.count, 2);
    }

    #[test]
    fn test_cache_stats_mirror() {
        let metrics = TesseraMetrics::new();
        metrics.record_cache_stats(&CacheStats {
            resident_segments: 3,
            usage_bytes: 300,
            capacity_bytes: 1000,
            forced_loads: 4,
            ..CacheStats::default()
        });
        let registry = metrics.registry();
        assert_eq!(registry.gauge_get(metrics::CACHE_RESIDENT_SEGMENTS), 3);
        assert_eq!(registry.gauge_get(metrics::CACHE_USAGE_BYTES), 300);
        assert_eq!(registry.counter_get(metrics::CACHE_FORCED_LOADS), 4);
    }

    #[test]
    fn test_health_probe() {
        let probe = HealthProbe::new();
        assert!(probe.is_healthy());

        probe.set_unhealthy("eviction task stopped");
        assert!(!probe.is_healthy());
        assert_eq!(probe.status().message, "eviction task stopped");

        probe.set_healthy();
        assert!(probe.is_healthy());
    }

    #[test]
    fn test_prometheus_export() {
        let registry = MetricsRegistry::new();
        registry.counter_inc("test.counter");
        registry.gauge_set("test.gauge", 42);

        let output = registry.export_prometheus();
        assert!(output.contains("test_counter 1"));
        assert!(output.contains("test_gauge 42"));
    }
}
