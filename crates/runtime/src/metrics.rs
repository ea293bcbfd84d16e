//! Metrics instrumentation for runtime observability.

use std::time::Instant;

/// Record suspension points surfaced by a run.
pub fn record_interrupts(count: usize) {
    metrics::counter!("interlude_interrupts_raised", count as u64);
}

/// Increment resume counter.
pub fn increment_resumes() {
    metrics::counter!("interlude_resumes", 1);
}

/// Increment checkpoint write counter.
pub fn increment_checkpoint_writes() {
    metrics::counter!("interlude_checkpoint_writes", 1);
}

/// Record run duration.
pub fn record_run_duration(duration_ms: f64) {
    metrics::histogram!("interlude_run_duration_ms", duration_ms);
}

/// RAII timer recording the run duration on drop.
pub struct RunTimer {
    start: Instant,
}

impl RunTimer {
    pub fn start() -> Self {
        Self { start: Instant::now() }
    }
}

impl Drop for RunTimer {
    fn drop(&mut self) {
        record_run_duration(self.start.elapsed().as_secs_f64() * 1000.0);
    }
}
