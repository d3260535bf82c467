//! Convenience macros for performance tracing.

/// Create a [`crate::performance::PerformanceSpan`] using the process-wide
/// default threshold. Extra fields are recorded on the span itself, so they
/// stay attached for as long as the guard lives.
///
/// ```rust
/// use genred_tracing::perf_span;
///
/// {
///     let span = perf_span!("invoke", nx = 500, ny = 400);
///     let _entered = span.enter();
/// }
/// ```
#[macro_export]
macro_rules! perf_span {
    ($name:expr) => {{
        $crate::performance::PerformanceSpan::new($name, $crate::performance::default_threshold())
    }};
    ($name:expr, $($field:tt = $value:expr),+ $(,)?) => {{
        $crate::performance::PerformanceSpan::from_span(
            tracing::debug_span!("perf", name = $name, $($field = $value),+),
            $crate::performance::default_threshold(),
        )
    }};
}
