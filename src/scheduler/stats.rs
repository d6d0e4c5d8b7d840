use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for everything the scheduler pushed at the transport
#[derive(Debug, Default)]
pub struct TransmissionStats {
    ticks: AtomicU64,
    periodic_sent: AtomicU64,
    immediate_sent: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`TransmissionStats`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub periodic_sent: u64,
    pub immediate_sent: u64,
    pub failed: u64,
}

impl StatsSnapshot {
    pub fn total_sent(&self) -> u64 {
        self.periodic_sent + self.immediate_sent
    }
}

impl TransmissionStats {
    pub fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_periodic_sent(&self) {
        self.periodic_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_immediate_sent(&self) {
        self.immediate_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            periodic_sent: self.periodic_sent.load(Ordering::Relaxed),
            immediate_sent: self.immediate_sent.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}
