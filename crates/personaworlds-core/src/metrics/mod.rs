//! Minimal in-process metrics.
//!
//! A handful of named monotonic counters rendered in Prometheus text
//! exposition format. No exporter dependency; both binaries mount the
//! rendered text on their `/metrics` endpoints.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One monotonic counter.
pub struct Counter {
    name: &'static str,
    help: &'static str,
    value: AtomicU64,
}

impl Counter {
    /// Increment by one.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A registry of counters, shared via `Arc`.
#[derive(Default)]
pub struct Registry {
    counters: Vec<Arc<Counter>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a counter and hand back a shared handle.
    pub fn counter(&mut self, name: &'static str, help: &'static str) -> Arc<Counter> {
        let counter = Arc::new(Counter {
            name,
            help,
            value: AtomicU64::new(0),
        });
        self.counters.push(counter.clone());
        counter
    }

    /// Render all counters in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for counter in &self.counters {
            out.push_str(&format!(
                "# HELP {name} {help}\n# TYPE {name} counter\n{name} {value}\n",
                name = counter.name,
                help = counter.help,
                value = counter.get(),
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_all_counters() {
        let mut registry = Registry::new();
        let requests = registry.counter("http_requests_total", "Total HTTP requests.");
        let errors = registry.counter("http_errors_total", "Total HTTP error responses.");
        requests.inc();
        requests.inc();
        errors.inc();

        let text = registry.render();
        assert!(text.contains("# TYPE http_requests_total counter"));
        assert!(text.contains("http_requests_total 2"));
        assert!(text.contains("http_errors_total 1"));
    }

    #[test]
    fn counters_start_at_zero() {
        let mut registry = Registry::new();
        let counter = registry.counter("jobs_processed_total", "Jobs processed.");
        assert_eq!(counter.get(), 0);
    }
}
