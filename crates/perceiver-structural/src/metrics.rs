//! Telemetry helpers for the snapshot pipeline.
//!
//! Plain atomic counters and latency aggregates, read by the CLI `snapshot --metrics` flag.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::model::CatalogSource;

static CATALOG_TOTAL: AtomicU64 = AtomicU64::new(0);
static CATALOG_FALLBACK: AtomicU64 = AtomicU64::new(0);
static CATALOG_EMPTY: AtomicU64 = AtomicU64::new(0);
static CATALOG_LAT_NS: AtomicU64 = AtomicU64::new(0);
static CATALOG_LAT_SAMPLES: AtomicU64 = AtomicU64::new(0);

static SNAPSHOT_TOTAL: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_CACHE_HIT: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_CACHE_MISS: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_LAT_NS: AtomicU64 = AtomicU64::new(0);
static SNAPSHOT_LAT_SAMPLES: AtomicU64 = AtomicU64::new(0);

static CACHE_EVICTIONS: AtomicU64 = AtomicU64::new(0);
static CACHE_INVALIDATIONS: AtomicU64 = AtomicU64::new(0);

static DIFF_TOTAL: AtomicU64 = AtomicU64::new(0);
static DIFF_LAT_NS: AtomicU64 = AtomicU64::new(0);
static DIFF_LAT_SAMPLES: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricCounter {
    pub total: u64,
    pub avg_ms: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheMetric {
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub invalidations: u64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricSnapshot {
    pub catalog: MetricCounter,
    pub catalog_fallback: u64,
    pub catalog_empty: u64,
    pub snapshot: MetricCounter,
    pub snapshot_cache: CacheMetric,
    pub diff: MetricCounter,
}

pub fn record_catalog(source: CatalogSource, duration: Duration) {
    CATALOG_TOTAL.fetch_add(1, Ordering::Relaxed);
    match source {
        CatalogSource::Mixed | CatalogSource::DomFallback => {
            CATALOG_FALLBACK.fetch_add(1, Ordering::Relaxed);
        }
        CatalogSource::Empty => {
            CATALOG_EMPTY.fetch_add(1, Ordering::Relaxed);
        }
        CatalogSource::Accessibility => {}
    }
    record_latency(&CATALOG_LAT_NS, &CATALOG_LAT_SAMPLES, duration);
}

pub fn record_snapshot(cache_hit: bool, duration: Duration) {
    SNAPSHOT_TOTAL.fetch_add(1, Ordering::Relaxed);
    if cache_hit {
        SNAPSHOT_CACHE_HIT.fetch_add(1, Ordering::Relaxed);
    } else {
        SNAPSHOT_CACHE_MISS.fetch_add(1, Ordering::Relaxed);
    }
    record_latency(&SNAPSHOT_LAT_NS, &SNAPSHOT_LAT_SAMPLES, duration);
}

pub fn record_eviction() {
    CACHE_EVICTIONS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_invalidation(count: usize) {
    CACHE_INVALIDATIONS.fetch_add(count as u64, Ordering::Relaxed);
}

pub fn record_diff(duration: Duration) {
    DIFF_TOTAL.fetch_add(1, Ordering::Relaxed);
    record_latency(&DIFF_LAT_NS, &DIFF_LAT_SAMPLES, duration);
}

pub fn snapshot() -> MetricSnapshot {
    MetricSnapshot {
        catalog: make_counter(
            CATALOG_TOTAL.load(Ordering::Relaxed),
            CATALOG_LAT_NS.load(Ordering::Relaxed),
            CATALOG_LAT_SAMPLES.load(Ordering::Relaxed),
        ),
        catalog_fallback: CATALOG_FALLBACK.load(Ordering::Relaxed),
        catalog_empty: CATALOG_EMPTY.load(Ordering::Relaxed),
        snapshot: make_counter(
            SNAPSHOT_TOTAL.load(Ordering::Relaxed),
            SNAPSHOT_LAT_NS.load(Ordering::Relaxed),
            SNAPSHOT_LAT_SAMPLES.load(Ordering::Relaxed),
        ),
        snapshot_cache: make_cache_metric(
            SNAPSHOT_CACHE_HIT.load(Ordering::Relaxed),
            SNAPSHOT_CACHE_MISS.load(Ordering::Relaxed),
        ),
        diff: make_counter(
            DIFF_TOTAL.load(Ordering::Relaxed),
            DIFF_LAT_NS.load(Ordering::Relaxed),
            DIFF_LAT_SAMPLES.load(Ordering::Relaxed),
        ),
    }
}

fn make_counter(total: u64, nanos: u64, samples: u64) -> MetricCounter {
    let avg_ms = if samples == 0 {
        0.0
    } else {
        (nanos as f64 / samples as f64) / 1_000_000.0
    };
    MetricCounter { total, avg_ms }
}

fn make_cache_metric(hits: u64, misses: u64) -> CacheMetric {
    let total = hits + misses;
    let hit_rate = if total == 0 {
        0.0
    } else {
        hits as f64 * 100.0 / total as f64
    };
    CacheMetric {
        hits,
        misses,
        hit_rate,
        evictions: CACHE_EVICTIONS.load(Ordering::Relaxed),
        invalidations: CACHE_INVALIDATIONS.load(Ordering::Relaxed),
    }
}

fn record_latency(total_ns: &AtomicU64, samples: &AtomicU64, duration: Duration) {
    let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
    total_ns.fetch_add(nanos, Ordering::Relaxed);
    samples.fetch_add(1, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_only_grow() {
        let before = snapshot();
        record_snapshot(true, Duration::from_millis(2));
        record_snapshot(false, Duration::from_millis(4));
        record_catalog(CatalogSource::DomFallback, Duration::from_millis(1));
        let after = snapshot();
        assert!(after.snapshot.total >= before.snapshot.total + 2);
        assert!(after.snapshot_cache.hits > before.snapshot_cache.hits);
        assert!(after.catalog_fallback > before.catalog_fallback);
        assert!(after.snapshot.avg_ms > 0.0);
    }
}
