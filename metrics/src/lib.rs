use std::time::Instant;

use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
};
pub use opentelemetry::KeyValue;

/// Histogram boundaries in seconds, sized for network-bound store calls.
/// Archival operations routinely take minutes, so the tail is long.
pub fn store_latency_boundaries() -> Vec<f64> {
    vec![
        0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0,
        1800.0,
    ]
}

/// Records elapsed wall time into a histogram when dropped, so a store call
/// is timed even on the error path.
pub struct Timed {
    histogram: Histogram<f64>,
    attributes: Vec<KeyValue>,
    start: Instant,
}

impl Timed {
    pub fn start(histogram: &Histogram<f64>, attributes: Vec<KeyValue>) -> Self {
        Self {
            histogram: histogram.clone(),
            attributes,
            start: Instant::now(),
        }
    }
}

impl Drop for Timed {
    fn drop(&mut self) {
        self.histogram
            .record(self.start.elapsed().as_secs_f64(), &self.attributes);
    }
}

#[derive(Clone)]
pub struct BlobStoreMetrics {
    pub operations: Counter<u64>,
    pub operation_latency: Histogram<f64>,
}

impl BlobStoreMetrics {
    pub fn new() -> Self {
        let meter = global::meter("blob_store");
        Self {
            operations: meter
                .u64_counter("blob_store_operations")
                .with_description("Hot store operations, by operation kind")
                .build(),
            operation_latency: meter
                .f64_histogram("blob_store_operation_latency")
                .with_unit("s")
                .with_boundaries(store_latency_boundaries())
                .with_description("Latency of hot store operations")
                .build(),
        }
    }
}

impl Default for BlobStoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct ArchiveStoreMetrics {
    pub operations: Counter<u64>,
    pub operation_latency: Histogram<f64>,
    pub fetched_bytes: Counter<u64>,
}

impl ArchiveStoreMetrics {
    pub fn new() -> Self {
        let meter = global::meter("archive_store");
        Self {
            operations: meter
                .u64_counter("archive_store_operations")
                .with_description("Cold store operations, by operation kind")
                .build(),
            operation_latency: meter
                .f64_histogram("archive_store_operation_latency")
                .with_unit("s")
                .with_boundaries(store_latency_boundaries())
                .with_description("Latency of cold store operations")
                .build(),
            fetched_bytes: meter
                .u64_counter("archive_store_fetched_bytes")
                .with_description("Bytes materialized from completed retrieval jobs")
                .build(),
        }
    }
}

impl Default for ArchiveStoreMetrics {
    fn default() -> Self {
        Self::new()
    }
}
