use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Counters of one [`AdmissionQueue`](super::AdmissionQueue).
///
/// Writes happen together with the queue mutation they describe; reads are lock-free
/// snapshots.
#[derive(Debug, Default)]
pub struct AdmissionStats {
    depth: AtomicUsize,
    queued: AtomicU64,
    dequeued: AtomicU64,
    rejected_full: AtomicU64,
    rejected_shutdown: AtomicU64,
}

impl AdmissionStats {
    /// Number of requests currently waiting.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    /// Requests that entered the queue.
    pub fn queued(&self) -> u64 {
        self.queued.load(Ordering::Relaxed)
    }

    /// Requests that left the queue to run.
    pub fn dequeued(&self) -> u64 {
        self.dequeued.load(Ordering::Relaxed)
    }

    pub fn rejected_full(&self) -> u64 {
        self.rejected_full.load(Ordering::Relaxed)
    }

    pub fn rejected_shutdown(&self) -> u64 {
        self.rejected_shutdown.load(Ordering::Relaxed)
    }

    pub(crate) fn record_enqueue(&self, depth: usize) {
        self.queued.fetch_add(1, Ordering::Relaxed);
        self.depth.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_dequeue(&self, depth: usize) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
        self.depth.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_drained(&self, depth: usize) {
        self.rejected_shutdown.fetch_add(1, Ordering::Relaxed);
        self.depth.store(depth, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_full(&self) {
        self.rejected_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejected_shutdown(&self) {
        self.rejected_shutdown.fetch_add(1, Ordering::Relaxed);
    }
}
