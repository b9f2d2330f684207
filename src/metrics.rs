//! Lightweight global metrics for the snapshot subsystem.
//!
//! Thread-safe atomic counters for:
//! - snapshot loading / manifest repair
//! - reference resolution (live reuse, offline opens, rollbacks)
//! - snapshot taking / clearing

use std::sync::atomic::{AtomicU64, Ordering};

// ----- Loading / manifests -----
static SNAPSHOTS_BUILT: AtomicU64 = AtomicU64::new(0);
static MANIFESTS_CREATED: AtomicU64 = AtomicU64::new(0);
static MANIFESTS_ENRICHED: AtomicU64 = AtomicU64::new(0);
static MANIFEST_READ_ERRORS: AtomicU64 = AtomicU64::new(0);
static MANIFEST_WRITE_ERRORS: AtomicU64 = AtomicU64::new(0);

// ----- Reference resolution -----
static REFS_LIVE_REUSED: AtomicU64 = AtomicU64::new(0);
static REFS_OFFLINE_OPENED: AtomicU64 = AtomicU64::new(0);
static REFS_ROLLBACKS: AtomicU64 = AtomicU64::new(0);

// ----- Take / clear -----
static SNAPSHOTS_TAKEN: AtomicU64 = AtomicU64::new(0);
static SNAPSHOTS_CLEARED: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct MetricsSnapshot {
    pub snapshots_built: u64,
    pub manifests_created: u64,
    pub manifests_enriched: u64,
    pub manifest_read_errors: u64,
    pub manifest_write_errors: u64,

    pub refs_live_reused: u64,
    pub refs_offline_opened: u64,
    pub refs_rollbacks: u64,

    pub snapshots_taken: u64,
    pub snapshots_cleared: u64,
}

impl MetricsSnapshot {
    /// Share of resolved references served by already-open live readers.
    pub fn live_reuse_ratio(&self) -> f64 {
        let total = self.refs_live_reused + self.refs_offline_opened;
        if total == 0 {
            0.0
        } else {
            self.refs_live_reused as f64 / total as f64
        }
    }
}

pub fn record_snapshot_built() {
    SNAPSHOTS_BUILT.fetch_add(1, Ordering::Relaxed);
}
pub fn record_manifest_created() {
    MANIFESTS_CREATED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_manifest_enriched() {
    MANIFESTS_ENRICHED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_manifest_read_error() {
    MANIFEST_READ_ERRORS.fetch_add(1, Ordering::Relaxed);
}
pub fn record_manifest_write_error() {
    MANIFEST_WRITE_ERRORS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_ref_live_reused() {
    REFS_LIVE_REUSED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_ref_offline_opened() {
    REFS_OFFLINE_OPENED.fetch_add(1, Ordering::Relaxed);
}
pub fn record_refs_rollback() {
    REFS_ROLLBACKS.fetch_add(1, Ordering::Relaxed);
}

pub fn record_snapshot_taken() {
    SNAPSHOTS_TAKEN.fetch_add(1, Ordering::Relaxed);
}
pub fn record_snapshot_cleared() {
    SNAPSHOTS_CLEARED.fetch_add(1, Ordering::Relaxed);
}

/// Read all counters.
pub fn metrics_snapshot() -> MetricsSnapshot {
    MetricsSnapshot {
        snapshots_built: SNAPSHOTS_BUILT.load(Ordering::Relaxed),
        manifests_created: MANIFESTS_CREATED.load(Ordering::Relaxed),
        manifests_enriched: MANIFESTS_ENRICHED.load(Ordering::Relaxed),
        manifest_read_errors: MANIFEST_READ_ERRORS.load(Ordering::Relaxed),
        manifest_write_errors: MANIFEST_WRITE_ERRORS.load(Ordering::Relaxed),

        refs_live_reused: REFS_LIVE_REUSED.load(Ordering::Relaxed),
        refs_offline_opened: REFS_OFFLINE_OPENED.load(Ordering::Relaxed),
        refs_rollbacks: REFS_ROLLBACKS.load(Ordering::Relaxed),

        snapshots_taken: SNAPSHOTS_TAKEN.load(Ordering::Relaxed),
        snapshots_cleared: SNAPSHOTS_CLEARED.load(Ordering::Relaxed),
    }
}

/// Reset all counters (tests/tools).
pub fn metrics_reset() {
    SNAPSHOTS_BUILT.store(0, Ordering::Relaxed);
    MANIFESTS_CREATED.store(0, Ordering::Relaxed);
    MANIFESTS_ENRICHED.store(0, Ordering::Relaxed);
    MANIFEST_READ_ERRORS.store(0, Ordering::Relaxed);
    MANIFEST_WRITE_ERRORS.store(0, Ordering::Relaxed);

    REFS_LIVE_REUSED.store(0, Ordering::Relaxed);
    REFS_OFFLINE_OPENED.store(0, Ordering::Relaxed);
    REFS_ROLLBACKS.store(0, Ordering::Relaxed);

    SNAPSHOTS_TAKEN.store(0, Ordering::Relaxed);
    SNAPSHOTS_CLEARED.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_only_grow_between_reads() {
        let before = metrics_snapshot();
        record_ref_live_reused();
        record_ref_offline_opened();
        record_manifest_created();
        let after = metrics_snapshot();
        assert!(after.refs_live_reused > before.refs_live_reused);
        assert!(after.refs_offline_opened > before.refs_offline_opened);
        assert!(after.manifests_created > before.manifests_created);
    }

    #[test]
    fn reuse_ratio() {
        let m = MetricsSnapshot {
            refs_live_reused: 3,
            refs_offline_opened: 1,
            ..MetricsSnapshot::default()
        };
        assert!((m.live_reuse_ratio() - 0.75).abs() < f64::EPSILON);
        assert_eq!(MetricsSnapshot::default().live_reuse_ratio(), 0.0);
    }
}
