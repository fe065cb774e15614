//! Atomic statistics counters surfaced to embedders.

use std::sync::atomic::{AtomicU64, Ordering};

/// Server-wide statistics. All fields are atomic; reads never block writers.
#[derive(Debug, Default)]
pub struct Statistics {
    udp_received_count: AtomicU64,
    udp_received_bytes: AtomicU64,
    relay_serv_count: AtomicU64,
    relay_serv_bytes: AtomicU64,
}

impl Statistics {
    pub fn record_udp_received(&self, bytes: u64) {
        self.udp_received_count.fetch_add(1, Ordering::Relaxed);
        self.udp_received_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn record_relay(&self, bytes: u64) {
        self.relay_serv_count.fetch_add(1, Ordering::Relaxed);
        self.relay_serv_bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn udp_received_count(&self) -> u64 {
        self.udp_received_count.load(Ordering::Relaxed)
    }

    pub fn udp_received_bytes(&self) -> u64 {
        self.udp_received_bytes.load(Ordering::Relaxed)
    }

    pub fn relay_serv_count(&self) -> u64 {
        self.relay_serv_count.load(Ordering::Relaxed)
    }

    pub fn relay_serv_bytes(&self) -> u64 {
        self.relay_serv_bytes.load(Ordering::Relaxed)
    }
}
