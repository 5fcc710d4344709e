//! In-process timings and counters for the job and text flows.
//! Each timing keeps a bounded window of recent samples (microseconds);
//! counters are plain monotonic totals.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::Serialize;

/// Samples retained per timing.
const WINDOW: usize = 256;

/// Correlation ids attached to one document job's logs.
#[derive(Debug, Clone)]
pub struct JobIds {
    pub trace_id: String,
    pub serial: u64,
}

impl JobIds {
    pub fn new(serial: u64) -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
            serial,
        }
    }
}

/// Started by [`MetricsRegistry::span`]; records only when `finish` is called,
/// so failed calls do not skew the timings.
pub struct Stopwatch {
    name: &'static str,
    started: Instant,
    registry: Arc<MetricsRegistry>,
}

impl Stopwatch {
    pub fn finish(self) -> f64 {
        let micros = self.started.elapsed().as_micros() as f64;
        self.registry.record(self.name, micros);
        micros
    }
}

#[derive(Default)]
struct Window {
    samples: VecDeque<f64>,
    total: usize,
}

impl Window {
    fn push(&mut self, value: f64) {
        if self.samples.len() == WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(value);
        self.total += 1;
    }

    /// Nearest-rank percentile over the retained samples.
    fn percentile(&self, p: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(f64::total_cmp);
        let rank = ((p / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
    /// Samples recorded since start, not just those retained.
    pub count: usize,
}

#[derive(Default)]
pub struct MetricsRegistry {
    timings: Mutex<HashMap<&'static str, Window>>,
    counters: Mutex<HashMap<&'static str, u64>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, micros: f64) {
        self.timings.lock().entry(name).or_default().push(micros);
        tracing::trace!(metric = name, micros, "timing recorded");
    }

    pub fn span(self: &Arc<Self>, name: &'static str) -> Stopwatch {
        Stopwatch {
            name,
            started: Instant::now(),
            registry: Arc::clone(self),
        }
    }

    pub fn incr(&self, name: &'static str) {
        *self.counters.lock().entry(name).or_insert(0) += 1;
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counters.lock().get(name).copied().unwrap_or(0)
    }

    /// Percentile (0-100) of a timing in microseconds; 0 when nothing was recorded.
    pub fn percentile(&self, name: &str, p: f64) -> f64 {
        self.timings
            .lock()
            .get(name)
            .map_or(0.0, |w| w.percentile(p))
    }

    pub fn summary(&self) -> HashMap<String, MetricSummary> {
        self.timings
            .lock()
            .iter()
            .map(|(name, w)| {
                let summary = MetricSummary {
                    p50_ms: w.percentile(50.0) / 1000.0,
                    p95_ms: w.percentile(95.0) / 1000.0,
                    max_ms: w.percentile(100.0) / 1000.0,
                    count: w.total,
                };
                (name.to_string(), summary)
            })
            .collect()
    }
}

pub mod metric_names {
    pub const UPLOAD_DONE: &str = "job.upload";
    pub const STATUS_POLL: &str = "job.status_poll";
    pub const DOWNLOAD_DONE: &str = "job.download";
    pub const TEXT_TRANSLATE_DONE: &str = "text.translate";
    pub const CACHE_HIT: &str = "text.cache_hit";
    pub const CACHE_MISS: &str = "text.cache_miss";
    pub const STALE_DISCARDED: &str = "text.stale_discarded";
}
