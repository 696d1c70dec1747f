//! Prometheus metrics for the aggregation pipeline.
//!
//! This module provides metrics for:
//! - Item processing (outcomes, durations)
//! - Library runs (results, asset bytes)
//! - Lookup cache effectiveness

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// Item Metrics
// =============================================================================

/// Items processed total by outcome.
pub static ITEMS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plexmeta_items_processed_total", "Total items processed"),
        &["outcome"], // "built", "skipped", "failed"
    )
    .unwrap()
});

/// Time spent resolving and building one item.
pub static ITEM_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "plexmeta_item_duration_seconds",
            "Duration of processing a single item",
        )
        .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["media_kind"],
    )
    .unwrap()
});

// =============================================================================
// Library Metrics
// =============================================================================

/// Library runs total by result.
pub static LIBRARY_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plexmeta_library_runs_total", "Total library runs"),
        &["result"], // "saved", "dry_run", "write_failed", "failed", "cancelled"
    )
    .unwrap()
});

/// Asset bytes counted across all runs.
pub static ASSET_BYTES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "plexmeta_asset_bytes_total",
        "Total bytes of poster, background and season assets counted",
    )
    .unwrap()
});

// =============================================================================
// Cache Metrics
// =============================================================================

/// Lookup cache hits and misses by cache kind.
pub static CACHE_LOOKUPS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("plexmeta_cache_lookups_total", "Lookup cache queries"),
        &["kind", "result"], // kind: "movie", "season", "episode"; result: "hit", "miss"
    )
    .unwrap()
});

/// Register all pipeline metrics with the given registry.
pub fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(ITEMS_PROCESSED.clone()))
        .unwrap();
    registry.register(Box::new(ITEM_DURATION.clone())).unwrap();
    registry.register(Box::new(LIBRARY_RUNS.clone())).unwrap();
    registry.register(Box::new(ASSET_BYTES.clone())).unwrap();
    registry.register(Box::new(CACHE_LOOKUPS.clone())).unwrap();
}

/// Render all metrics in the Prometheus text format.
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
