//! Dispatch metrics and statistics tracking.

use crate::types::BatchStats;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Metrics collector for prediction dispatch
pub struct DispatchMetrics {
    /// Descriptor-vector requests served
    pub descriptor_requests: AtomicU64,
    /// SMILES batch requests served
    pub smiles_requests: AtomicU64,
    /// Requests that ended in an error
    pub failed_requests: AtomicU64,
    /// Non-empty SMILES input lines
    pub lines_seen: AtomicU64,
    /// Lines that became records
    pub records_resolved: AtomicU64,
    /// Lines dropped by the field resolver
    pub records_dropped: AtomicU64,
    /// Batches answered with the empty-batch diagnostic
    pub empty_batches: AtomicU64,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl DispatchMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            descriptor_requests: AtomicU64::new(0),
            smiles_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            lines_seen: AtomicU64::new(0),
            records_resolved: AtomicU64::new(0),
            records_dropped: AtomicU64::new(0),
            empty_batches: AtomicU64::new(0),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            start_time: Instant::now(),
        }
    }

    /// Record a descriptor-vector prediction
    pub fn record_descriptors(&self, processing_time: Duration) {
        self.descriptor_requests.fetch_add(1, Ordering::Relaxed);
        self.record_time(processing_time);
    }

    /// Record a SMILES batch prediction
    pub fn record_batch(&self, processing_time: Duration, stats: BatchStats) {
        self.smiles_requests.fetch_add(1, Ordering::Relaxed);
        self.lines_seen.fetch_add(stats.lines as u64, Ordering::Relaxed);
        self.records_resolved
            .fetch_add(stats.resolved as u64, Ordering::Relaxed);
        self.records_dropped
            .fetch_add(stats.dropped as u64, Ordering::Relaxed);
        if stats.resolved == 0 {
            self.empty_batches.fetch_add(1, Ordering::Relaxed);
        }
        self.record_time(processing_time);
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    fn record_time(&self, processing_time: Duration) {
        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            // Keep only last 10000 for memory efficiency
            if times.len() > 10000 {
                times.drain(0..5000);
            }
        }
    }

    /// Total requests, successful or not
    pub fn total_requests(&self) -> u64 {
        self.descriptor_requests.load(Ordering::Relaxed)
            + self.smiles_requests.load(Ordering::Relaxed)
            + self.failed_requests.load(Ordering::Relaxed)
    }

    /// Share of SMILES lines dropped, in percent
    pub fn drop_rate(&self) -> f64 {
        let lines = self.lines_seen.load(Ordering::Relaxed);
        if lines == 0 {
            return 0.0;
        }
        self.records_dropped.load(Ordering::Relaxed) as f64 / lines as f64 * 100.0
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let times = match self.processing_times.read() {
            Ok(times) => times,
            Err(poisoned) => poisoned.into_inner(),
        };
        if times.is_empty() {
            return ProcessingStats::default();
        }

        let mut sorted: Vec<u64> = times.clone();
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: *sorted.last().unwrap_or(&0),
        }
    }

    /// Get current throughput (requests per second)
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_requests() as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let processing = self.get_processing_stats();

        info!("Dispatch metrics summary");
        info!(
            descriptor_requests = self.descriptor_requests.load(Ordering::Relaxed),
            smiles_requests = self.smiles_requests.load(Ordering::Relaxed),
            failed_requests = self.failed_requests.load(Ordering::Relaxed),
            throughput = format!("{:.1} req/s", self.get_throughput()),
            "Requests"
        );
        info!(
            lines = self.lines_seen.load(Ordering::Relaxed),
            resolved = self.records_resolved.load(Ordering::Relaxed),
            dropped = self.records_dropped.load(Ordering::Relaxed),
            empty_batches = self.empty_batches.load(Ordering::Relaxed),
            drop_rate = format!("{:.1}%", self.drop_rate()),
            "SMILES records"
        );
        info!(
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Processing time"
        );
    }
}

impl Default for DispatchMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}
