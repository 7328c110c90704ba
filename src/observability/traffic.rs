//! Process-wide count of response bytes proxied.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::observability::metrics;

const MIB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Default)]
pub struct TrafficCounter {
    bytes: AtomicU64,
}

impl TrafficCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, bytes: u64) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        metrics::record_bytes_proxied(bytes);
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn total_mib(&self) -> f64 {
        self.total_bytes() as f64 / MIB
    }
}

/// Express a byte count in MiB for log lines.
pub fn to_mib(bytes: u64) -> f64 {
    bytes as f64 / MIB
}
