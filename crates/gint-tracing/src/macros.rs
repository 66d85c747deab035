//! Instrumentation shorthands.

/// Create a [`crate::performance::PerformanceSpan`] using the process-wide
/// threshold. Extra fields are recorded on the span that frames its
/// completion event.
///
/// ```rust
/// use gint_tracing::perf_span;
///
/// let _span = perf_span!("engine_compute", entries = 12);
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::with_default_threshold($name)
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        let name = $name;
        let span = $crate::__private::tracing::debug_span!(
            "perf",
            name = %name,
            $($field = $value),+
        );
        $crate::performance::PerformanceSpan::with_span(name, $crate::performance::default_threshold(), span)
    }};
}

/// Run a block and return `(result, duration_us)`, logging the duration.
#[macro_export]
macro_rules! timed_block {
    ($name:expr, $block:block) => {{
        let start = ::std::time::Instant::now();
        let result = $block;
        let duration_us = start.elapsed().as_micros() as u64;
        $crate::__private::tracing::debug!(operation = $name, duration_us = duration_us, "timed_block_complete");
        (result, duration_us)
    }};
}
