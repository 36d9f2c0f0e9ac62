//! Metrics helpers for the router.
//!
//! Thin wrappers over the `metrics` crate macros. No exporter is installed
//! here; the host application installs whatever recorder it wants and these
//! calls become no-ops without one.
//!
//! Provided metrics:
//! * `junction_dispatch_total` (counter, labels `method`, `outcome`)
//! * `junction_dispatch_duration_seconds` (histogram, label `method`)
//! * `junction_route_cache_total` (counter, label `result`)
//! * `junction_routes_loaded` (gauge)
use std::time::{Duration, Instant};

use metrics::{Unit, counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::Lazy;

pub const JUNCTION_DISPATCH_TOTAL: &str = "junction_dispatch_total";
pub const JUNCTION_DISPATCH_DURATION_SECONDS: &str = "junction_dispatch_duration_seconds";
pub const JUNCTION_ROUTE_CACHE_TOTAL: &str = "junction_route_cache_total";
pub const JUNCTION_ROUTES_LOADED: &str = "junction_routes_loaded";

static DESCRIPTIONS: Lazy<()> = Lazy::new(|| {
    describe_counter!(
        JUNCTION_DISPATCH_TOTAL,
        Unit::Count,
        "Requests dispatched by the router, by outcome."
    );
    describe_histogram!(
        JUNCTION_DISPATCH_DURATION_SECONDS,
        Unit::Seconds,
        "Time spent matching a request and running its middleware chain."
    );
    describe_counter!(
        JUNCTION_ROUTE_CACHE_TOTAL,
        Unit::Count,
        "Route cache lookups by result (hit, miss, store, error)."
    );
    describe_gauge!(JUNCTION_ROUTES_LOADED, "Routes in the most recently frozen router.");
});

/// Outcome label for a dispatch that ended with `status`.
pub fn outcome_label(status: u16) -> &'static str {
    match status {
        404 => "not_found",
        405 => "method_not_allowed",
        500..=599 => "error",
        _ => "matched",
    }
}

/// Count a finished dispatch.
pub fn record_dispatch(method: &str, status: u16) {
    counter!(
        JUNCTION_DISPATCH_TOTAL,
        "method" => method.to_string(),
        "outcome" => outcome_label(status)
    )
    .increment(1);
}

/// Count a route cache lookup. `result` is one of `hit`, `miss`, `store`, `error`.
pub fn record_cache(result: &'static str) {
    counter!(JUNCTION_ROUTE_CACHE_TOTAL, "result" => result).increment(1);
}

pub fn set_routes_loaded(count: usize) {
    gauge!(JUNCTION_ROUTES_LOADED).set(count as f64);
}

/// RAII helper recording a dispatch duration when dropped.
pub struct DispatchTimer {
    start: Instant,
    method: String,
}

impl DispatchTimer {
    pub fn new(method: &str) -> Self {
        Self {
            start: Instant::now(),
            method: method.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for DispatchTimer {
    fn drop(&mut self) {
        histogram!(JUNCTION_DISPATCH_DURATION_SECONDS, "method" => self.method.clone())
            .record(self.start.elapsed().as_secs_f64());
    }
}

/// Register metric descriptions (idempotent).
pub fn init_metrics() -> eyre::Result<()> {
    tracing::info!("Initializing junction metrics");
    Lazy::force(&DESCRIPTIONS);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_label() {
        assert_eq!(outcome_label(200), "matched");
        assert_eq!(outcome_label(401), "matched");
        assert_eq!(outcome_label(404), "not_found");
        assert_eq!(outcome_label(405), "method_not_allowed");
        assert_eq!(outcome_label(503), "error");
    }

    #[test]
    fn test_recording_without_recorder() {
        record_dispatch("GET", 200);
        record_cache("hit");
        set_routes_loaded(4);
        let timer = DispatchTimer::new("POST");
        assert!(timer.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_init_metrics() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }
}
