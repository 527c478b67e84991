//! Metrics hooks for branch cache operations.
//!
//! Implement [`CacheMetrics`] to feed cache events into a monitoring system
//! and install it on the root branch:
//!
//! ```ignore
//! use branch_cache::observability::CacheMetrics;
//! use branch_cache::CacheBranchSync;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_set(&self, _path: &str, _duration: Duration) {
//!         // histogram!("generator_latency").record(duration);
//!     }
//!     // ... implement other methods
//! }
//!
//! let tree = CacheBranchSync::<u64>::new().with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! Every handle derived from a tree (`root()`, `branch()`, the root handed to
//! generators) shares the same sink.
//!
//! # Events
//!
//! - `record_hit()` - `ensure`/`get`/`peek` found a dirty node
//! - `record_miss()` - `ensure`/`get`/`peek` found a node that was never produced
//! - `record_set()` - a generator produced a value through `ensure` or `set`
//! - `record_refresh()` - a stored generator was re-run through `cache`
//! - `record_delete()` - a branch and its subtree were discarded
//! - `record_error()` - a generator failed
//!
//! Default method bodies log through the `log` crate; [`NoOpMetrics`] (the
//! default sink) discards everything.

use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a lookup that found a cached value.
    fn record_hit(&self, path: &str) {
        debug!("Branch HIT: {}", path);
    }

    /// Record a lookup that found no cached value.
    fn record_miss(&self, path: &str) {
        debug!("Branch MISS: {}", path);
    }

    /// Record a value produced by a newly supplied generator.
    fn record_set(&self, path: &str, duration: Duration) {
        debug!("Branch SET: {} took {:?}", path, duration);
    }

    /// Record a value re-produced by the stored generator.
    fn record_refresh(&self, path: &str, duration: Duration) {
        debug!("Branch REFRESH: {} took {:?}", path, duration);
    }

    /// Record a branch deletion.
    fn record_delete(&self, path: &str) {
        debug!("Branch DELETE: {}", path);
    }

    /// Record a generator failure.
    fn record_error(&self, path: &str, error: &str) {
        warn!("Branch ERROR for {}: {}", path, error);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Debug, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _path: &str) {}
    fn record_miss(&self, _path: &str) {}
    fn record_set(&self, _path: &str, _duration: Duration) {}
    fn record_refresh(&self, _path: &str, _duration: Duration) {}
    fn record_delete(&self, _path: &str) {}
    fn record_error(&self, _path: &str, _error: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_noop_metrics() {
        let metrics = NoOpMetrics;
        metrics.record_hit("a");
        metrics.record_miss("a/b");
        metrics.record_set("a", Duration::from_millis(1));
        metrics.record_refresh("a", Duration::from_millis(2));
    }

    #[test]
    fn test_default_methods_are_overridable() {
        #[derive(Default)]
        struct Deletions(Mutex<Vec<String>>);

        impl CacheMetrics for Deletions {
            fn record_delete(&self, path: &str) {
                self.0.lock().unwrap().push(path.to_string());
            }
        }

        let metrics = Deletions::default();
        metrics.record_hit("ignored");
        metrics.record_delete("user/name");
        assert_eq!(*metrics.0.lock().unwrap(), vec!["user/name".to_string()]);
    }
}
