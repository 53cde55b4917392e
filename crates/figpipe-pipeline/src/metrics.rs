//! Per-stage wall-clock timings and run-level quality metrics.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::{Duration, Instant};

use serde_json::Value;

/// Collects per-stage durations (seconds, 3 decimals) and scalar quality metrics.
#[derive(Debug, Clone, Default)]
pub struct StageMetrics {
    pub stage_timings: BTreeMap<String, f64>,
    pub quality_metrics: BTreeMap<String, Value>,
}

impl StageMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Await `fut` and record its elapsed time under `stage_name`.
    pub async fn timed<F, T>(&mut self, stage_name: &str, fut: F) -> T
    where
        F: Future<Output = T>,
    {
        let start = Instant::now();
        let result = fut.await;
        self.record(stage_name, start.elapsed());
        result
    }

    /// Run a synchronous unit of work and record its elapsed time.
    pub fn timed_sync<T>(&mut self, stage_name: &str, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let result = f();
        self.record(stage_name, start.elapsed());
        result
    }

    /// Record a duration. Later writes for the same stage overwrite earlier ones.
    pub fn record(&mut self, stage_name: &str, elapsed: Duration) {
        let seconds = (elapsed.as_secs_f64() * 1000.0).round() / 1000.0;
        self.stage_timings.insert(stage_name.to_string(), seconds);
    }

    /// Record a zero timing unless the stage already has one (cache hits).
    pub fn record_zero_if_absent(&mut self, stage_name: &str) {
        self.stage_timings.entry(stage_name.to_string()).or_insert(0.0);
    }

    /// Merge scalar metrics into the quality map.
    pub fn set_quality(&mut self, metrics: impl IntoIterator<Item = (String, Value)>) {
        self.quality_metrics.extend(metrics);
    }
}
