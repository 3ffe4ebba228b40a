//! Opt-in profiling counters.
//!
//! Off unless the `PN_TIMING` environment variable is set or
//! [`enable_timing`] was called. Disabled timers cost one atomic load.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);

pub fn enable_timing() {
    ENABLED.store(true, Ordering::Relaxed);
}

pub fn disable_timing() {
    ENABLED.store(false, Ordering::Relaxed);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed) || std::env::var_os("PN_TIMING").is_some()
}

/// Wall-clock span started at construction.
pub struct Timer {
    start: Instant,
    enabled: bool,
}

impl Timer {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
            enabled: is_enabled(),
        }
    }

    /// Elapsed seconds, or `None` when timing was off at start.
    pub fn stop(self) -> Option<f64> {
        self.enabled.then(|| self.start.elapsed().as_secs_f64())
    }

    pub fn stop_into(self, acc: &AccumulatingTimer) {
        if let Some(secs) = self.stop() {
            acc.record(secs);
        }
    }
}

/// Call count and total duration of a hot path, safe to share between threads.
pub struct AccumulatingTimer {
    total_ns: AtomicU64,
    calls: AtomicU64,
}

impl Default for AccumulatingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl AccumulatingTimer {
    pub const fn new() -> Self {
        Self {
            total_ns: AtomicU64::new(0),
            calls: AtomicU64::new(0),
        }
    }

    pub fn record(&self, secs: f64) {
        self.total_ns.fetch_add((secs * 1e9) as u64, Ordering::Relaxed);
        self.calls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_seconds(&self) -> f64 {
        self.total_ns.load(Ordering::Relaxed) as f64 * 1e-9
    }

    pub fn count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn average_seconds(&self) -> f64 {
        match self.count() {
            0 => 0.0,
            n => self.total_seconds() / n as f64,
        }
    }

    pub fn reset(&self) {
        self.total_ns.store(0, Ordering::Relaxed);
        self.calls.store(0, Ordering::Relaxed);
    }

    fn summary_line(&self, label: &str) -> Option<String> {
        (self.count() > 0).then(|| {
            format!(
                "{label:<20} {} calls, {:.3}s total, {:.4}ms avg",
                self.count(),
                self.total_seconds(),
                self.average_seconds() * 1e3
            )
        })
    }
}

/// Hot-path counters shared by the solver and the clustering engine.
pub mod engine_timing {
    use super::AccumulatingTimer;

    /// Pressure assembly and linear solves
    pub static PRESSURE_SOLVES: AccumulatingTimer = AccumulatingTimer::new();
    /// Clustering passes
    pub static CLUSTERING: AccumulatingTimer = AccumulatingTimer::new();

    pub fn reset_all() {
        PRESSURE_SOLVES.reset();
        CLUSTERING.reset();
    }
}

/// Timings of one run, filled by the orchestrator.
#[derive(Debug, Default, Clone)]
pub struct PerfStats {
    pub setup_time_s: f64,
    /// (stage label, wall seconds) in execution order
    pub stage_times_s: Vec<(String, f64)>,
    pub total_time_s: f64,
    /// Capillary pressure steps over all displacement stages
    pub pressure_steps: usize,
    /// Explicit time steps over all transport stages
    pub time_steps: usize,
}

impl PerfStats {
    /// Summary lines; empty when timing is off.
    pub fn summary_lines(&self) -> Vec<String> {
        if !is_enabled() {
            return Vec::new();
        }
        let mut lines = vec![
            "--- porenet profile ---".to_string(),
            format!("setup                {:.3}s", self.setup_time_s),
        ];
        lines.extend(
            self.stage_times_s
                .iter()
                .map(|(stage, secs)| format!("  {stage:<26} {secs:.3}s")),
        );
        lines.push(format!("total                {:.3}s", self.total_time_s));
        lines.push(format!("pressure steps       {}", self.pressure_steps));
        lines.push(format!("time steps           {}", self.time_steps));
        lines.extend(engine_timing::PRESSURE_SOLVES.summary_line("pressure solves"));
        lines.extend(engine_timing::CLUSTERING.summary_line("clustering passes"));
        lines
    }
}
