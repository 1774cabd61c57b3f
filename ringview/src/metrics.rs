//! Metrics for ringview consumers and producers.
//!
//! Lightweight counters for observability

use std::sync::atomic::{ AtomicU64, Ordering };

use serde::Serialize;

/// Global metrics counters
pub struct Metrics {
    pub records_consumed: AtomicU64,
    pub bytes_consumed: AtomicU64,
    pub records_produced: AtomicU64,
    pub reserve_failures: AtomicU64,
    pub waits_armed: AtomicU64,
    pub transient_retries: AtomicU64,
    pub starvations: AtomicU64,
    pub framing_errors: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            records_consumed: AtomicU64::new(0),
            bytes_consumed: AtomicU64::new(0),
            records_produced: AtomicU64::new(0),
            reserve_failures: AtomicU64::new(0),
            waits_armed: AtomicU64::new(0),
            transient_retries: AtomicU64::new(0),
            starvations: AtomicU64::new(0),
            framing_errors: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_consumed(&self, bytes: u64) {
        self.records_consumed.fetch_add(1, Ordering::Relaxed);
        self.bytes_consumed.fetch_add(bytes, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_produced(&self) {
        self.records_produced.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reserve_failure(&self) {
        self.reserve_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_wait_armed(&self) {
        self.waits_armed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_transient_retry(&self) {
        self.transient_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_starvation(&self) {
        self.starvations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_framing_error(&self) {
        self.framing_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_consumed: self.records_consumed.load(Ordering::Relaxed),
            bytes_consumed: self.bytes_consumed.load(Ordering::Relaxed),
            records_produced: self.records_produced.load(Ordering::Relaxed),
            reserve_failures: self.reserve_failures.load(Ordering::Relaxed),
            waits_armed: self.waits_armed.load(Ordering::Relaxed),
            transient_retries: self.transient_retries.load(Ordering::Relaxed),
            starvations: self.starvations.load(Ordering::Relaxed),
            framing_errors: self.framing_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.records_consumed.store(0, Ordering::Relaxed);
        self.bytes_consumed.store(0, Ordering::Relaxed);
        self.records_produced.store(0, Ordering::Relaxed);
        self.reserve_failures.store(0, Ordering::Relaxed);
        self.waits_armed.store(0, Ordering::Relaxed);
        self.transient_retries.store(0, Ordering::Relaxed);
        self.starvations.store(0, Ordering::Relaxed);
        self.framing_errors.store(0, Ordering::Relaxed);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_consumed: u64,
    pub bytes_consumed: u64,
    pub records_produced: u64,
    pub reserve_failures: u64,
    pub waits_armed: u64,
    pub transient_retries: u64,
    pub starvations: u64,
    pub framing_errors: u64,
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "consumed={} bytes={} produced={} reserve_fail={} waits={} retries={} starved={} framing={}",
            self.records_consumed,
            self.bytes_consumed,
            self.records_produced,
            self.reserve_failures,
            self.waits_armed,
            self.transient_retries,
            self.starvations,
            self.framing_errors
        )
    }
}

/// Global metrics instance
pub static METRICS: Metrics = Metrics::new();
