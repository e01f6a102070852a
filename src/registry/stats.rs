use super::MergeOutcome;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for merge decisions and snapshot broadcasts
#[derive(Default)]
pub struct RegistryStats {
    inserted: AtomicU64,
    replaced: AtomicU64,
    stale: AtomicU64,
    broadcasts: AtomicU64,
    failed_broadcasts: AtomicU64,
}

/// Point-in-time copy of [`RegistryStats`]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub inserted: u64,
    pub replaced: u64,
    pub stale: u64,
    pub broadcasts: u64,
    pub failed_broadcasts: u64,
}

impl RegistryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_merge(&self, outcome: MergeOutcome) {
        let counter = match outcome {
            MergeOutcome::Inserted => &self.inserted,
            MergeOutcome::Replaced => &self.replaced,
            MergeOutcome::Stale => &self.stale,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, published: bool) {
        if published {
            self.broadcasts.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_broadcasts.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            inserted: self.inserted.load(Ordering::Relaxed),
            replaced: self.replaced.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            failed_broadcasts: self.failed_broadcasts.load(Ordering::Relaxed),
        }
    }
}
