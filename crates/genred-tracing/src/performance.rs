//! Performance-focused tracing utilities.
//!
//! ```rust
//! use genred_tracing::performance::{record_reduction, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("reduction", Some(100));
//! drop(span); // logged only when it took at least 100µs
//!
//! record_reduction("CPU", 500, 400, 1_250);
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Sentinel for "no threshold" in [`DEFAULT_THRESHOLD_US`]
const NO_THRESHOLD: u64 = u64::MAX;

static DEFAULT_THRESHOLD_US: AtomicU64 = AtomicU64::new(NO_THRESHOLD);

/// Threshold used by [`crate::perf_span!`]; `None` logs every span.
pub fn set_default_threshold(threshold_us: Option<u64>) {
    DEFAULT_THRESHOLD_US.store(threshold_us.unwrap_or(NO_THRESHOLD), Ordering::Relaxed);
}

pub fn default_threshold() -> Option<u64> {
    match DEFAULT_THRESHOLD_US.load(Ordering::Relaxed) {
        NO_THRESHOLD => None,
        threshold_us => Some(threshold_us),
    }
}

/// RAII guard that measures its own lifetime and logs it on drop when the
/// duration reaches the optional threshold.
pub struct PerformanceSpan {
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// Create a debug-level span. `threshold_us = None` always logs.
    pub fn new(span_name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let span_name = span_name.into();
        Self::from_span(tracing::debug_span!("perf", name = %span_name), threshold_us)
    }

    /// Time an existing span, typically one carrying extra fields.
    pub fn from_span(span: tracing::Span, threshold_us: Option<u64>) -> Self {
        Self {
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    /// Elapsed time since creation.
    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    /// Enter this span's context.
    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        let elapsed_us = self.elapsed_us();

        if self.threshold_us.map_or(true, |t| elapsed_us >= t) {
            let _entered = self.span.enter();
            tracing::debug!(
                duration_us = elapsed_us,
                duration_ms = elapsed_us as f64 / 1000.0,
                "performance_span_complete"
            );
        }
    }
}

/// Record one completed pairwise reduction with its pair throughput.
pub fn record_reduction(backend: &str, nx: usize, ny: usize, duration_us: u64) {
    let pairs = nx as f64 * ny as f64;
    let pairs_per_sec = if duration_us > 0 {
        pairs / duration_us as f64 * 1_000_000.0
    } else {
        0.0
    };

    tracing::debug!(
        event = "reduction",
        backend = backend,
        nx = nx,
        ny = ny,
        duration_us = duration_us,
        pairs_per_sec = pairs_per_sec,
        "pairwise_reduction"
    );
}

/// Record a finished routine compilation.
pub fn record_compilation(routine: &str, duration_us: u64) {
    tracing::info!(
        event = "compilation",
        routine = routine,
        duration_us = duration_us,
        duration_s = duration_us as f64 / 1_000_000.0,
        "routine_compiled"
    );
}
