//! Timing guards and standard-format events for allocations, transfers and
//! integral throughput.
//!
//! ```rust
//! use gint_tracing::performance::{record_transfer, PerformanceSpan};
//!
//! let span = PerformanceSpan::new("stage_batch", Some(100));
//! // ... work ...
//! drop(span); // logged only if it took at least 100μs
//!
//! record_transfer(8 * 1000, "H2D", 12);
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

const NO_THRESHOLD: u64 = u64::MAX;

static ENABLED: AtomicBool = AtomicBool::new(true);
static DEFAULT_THRESHOLD_US: AtomicU64 = AtomicU64::new(NO_THRESHOLD);

/// Apply process-wide performance settings. Called by
/// [`crate::init_global_tracing`]; tests may call it directly.
pub fn configure(enabled: bool, threshold_us: Option<u64>) {
    ENABLED.store(enabled, Ordering::Relaxed);
    DEFAULT_THRESHOLD_US.store(threshold_us.unwrap_or(NO_THRESHOLD), Ordering::Relaxed);
}

/// Whether performance spans currently log on drop.
pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

#[doc(hidden)]
pub fn default_threshold() -> Option<u64> {
    match DEFAULT_THRESHOLD_US.load(Ordering::Relaxed) {
        NO_THRESHOLD => None,
        threshold => Some(threshold),
    }
}

/// RAII guard that times its own lifetime and logs on drop when the duration
/// reaches the threshold.
pub struct PerformanceSpan {
    name: String,
    threshold_us: Option<u64>,
    start_time: Instant,
    span: tracing::Span,
}

impl PerformanceSpan {
    /// `threshold_us = None` logs every span.
    pub fn new(name: impl Into<String>, threshold_us: Option<u64>) -> Self {
        let name = name.into();
        let span = tracing::debug_span!("perf", name = %name);
        Self::with_span(name, threshold_us, span)
    }

    /// Time under a caller-built span; its fields frame the completion event.
    pub fn with_span(name: impl Into<String>, threshold_us: Option<u64>, span: tracing::Span) -> Self {
        Self {
            name: name.into(),
            threshold_us,
            start_time: Instant::now(),
            span,
        }
    }

    /// Span using the threshold installed by [`configure`].
    pub fn with_default_threshold(name: impl Into<String>) -> Self {
        Self::new(name, default_threshold())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn elapsed_us(&self) -> u64 {
        self.start_time.elapsed().as_micros() as u64
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for PerformanceSpan {
    fn drop(&mut self) {
        if !is_enabled() {
            return;
        }
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

/// Record a buffer allocation in either memory space.
pub fn record_allocation(size_bytes: usize, space: &str, duration_us: u64) {
    tracing::debug!(
        event = "allocation",
        size_bytes = size_bytes,
        size_kb = size_bytes as f64 / 1024.0,
        space = space,
        duration_us = duration_us,
        "memory_allocation"
    );
}

/// Bandwidth in MiB/s, zero when the duration rounds to nothing.
pub fn bandwidth_mbps(bytes: usize, duration_us: u64) -> f64 {
    if duration_us > 0 {
        (bytes as f64 / duration_us as f64) * 1_000_000.0 / (1024.0 * 1024.0)
    } else {
        0.0
    }
}

/// Record a copy between memory spaces. `direction` is one of `H2H`, `H2D`,
/// `D2H`, `D2D`.
pub fn record_transfer(bytes: usize, direction: &str, duration_us: u64) {
    let bandwidth = bandwidth_mbps(bytes, duration_us);
    tracing::debug!(
        event = "transfer",
        bytes = bytes,
        direction = direction,
        duration_us = duration_us,
        bandwidth_mbps = bandwidth,
        "data_transfer"
    );
}

/// Record how many integrals an operation produced per second.
pub fn record_throughput(operation: &str, elements: usize, duration_us: u64) {
    let elements_per_sec = if duration_us > 0 {
        (elements as f64 / duration_us as f64) * 1_000_000.0
    } else {
        0.0
    };

    tracing::debug!(
        event = "throughput",
        operation = operation,
        elements = elements,
        duration_us = duration_us,
        elements_per_sec = elements_per_sec,
        "operation_throughput"
    );
}
