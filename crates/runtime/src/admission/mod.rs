//! Capacity aware request admission.
//!
//! An [`AdmissionQueue`] decides for each incoming request whether it runs now, waits in
//! a bounded FIFO queue, or is rejected. The decision depends on how many workers the
//! [`CapacityProbe`] reports as free:
//!
//! - more than `min_free_workers` free: run now
//! - a local request and more than `min_free_workers_for_local` free: run now
//! - otherwise: queue, or reject with [`RejectReason::CapacityExceeded`] when the queue is
//!   full
//!
//! Queued requests always run before newer ones. When a request may run and the queue is
//! not empty, the oldest queued request is returned instead and the new one takes its
//! place at the back.
//!
//! Callers drain the queue by calling [`AdmissionQueue::admit`] with `None` whenever a
//! worker frees up. [`AdmissionQueue::shutdown`] rejects everything still waiting.
//!
//! Each request handed to the queue ends up exactly once in one of three places: returned
//! from `admit`, rejected as over capacity, or rejected at shutdown.

mod probe;
mod stats;

pub use probe::CapacityProbe;
pub use probe::PendingRequest;
pub use probe::RejectReason;
pub use probe::RejectionSink;
pub use stats::AdmissionStats;

use std::collections::VecDeque;
use std::fmt;

use parking_lot::Mutex;
use tracing::{info, trace, warn};

use crate::config::AdmissionConfig;

struct QueueState<R> {
    queue: VecDeque<R>,
    disposing: bool,
}

pub struct AdmissionQueue<R, P, S> {
    config: AdmissionConfig,
    probe: P,
    sink: S,
    state: Mutex<QueueState<R>>,
    stats: AdmissionStats,
}

impl<R, P, S> AdmissionQueue<R, P, S>
where
    R: PendingRequest,
    P: CapacityProbe,
    S: RejectionSink<R>,
{
    pub fn new(config: AdmissionConfig, probe: P, sink: S) -> Self {
        Self { config, probe, sink, state: Mutex::new(QueueState { queue: VecDeque::new(), disposing: false }), stats: AdmissionStats::default() }
    }

    /// Offers `incoming` to the queue and returns the request that should run now, if any.
    ///
    /// The returned request is either `incoming` itself or an older queued request, in
    /// which case `incoming` has been queued behind the others. `None` means nothing may
    /// run: `incoming` is queued or, when the queue is full or shutting down, handed to
    /// the rejection sink.
    ///
    /// Pass `None` to pull the oldest queued request once capacity frees up.
    pub fn admit(&self, incoming: Option<R>) -> Option<R> {
        let free = self.probe.free_workers();
        let is_local = incoming.as_ref().is_some_and(PendingRequest::is_local);

        let mut rejected = None;
        let admitted = {
            let mut state = self.state.lock();
            let can_run_now = !state.disposing
                && (free > self.config.min_free_workers() || (is_local && free > self.config.min_free_workers_for_local()));

            if can_run_now {
                match state.queue.pop_front() {
                    Some(oldest) => {
                        self.stats.record_dequeue(state.queue.len());
                        if let Some(request) = incoming {
                            rejected = self.enqueue(&mut state, request);
                        }
                        trace!(free, depth = state.queue.len(), "dispatching oldest queued request");
                        Some(oldest)
                    }
                    None => incoming,
                }
            } else {
                if let Some(request) = incoming {
                    if state.disposing {
                        rejected = Some((request, RejectReason::ShuttingDown));
                    } else {
                        rejected = self.enqueue(&mut state, request);
                        trace!(free, is_local, depth = state.queue.len(), "no free capacity, request queued");
                    }
                }
                None
            }
        };

        if let Some((request, reason)) = rejected {
            self.reject(request, reason);
        }
        admitted
    }

    /// Rejects every queued request and refuses all later ones.
    ///
    /// Calling it again is harmless.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.lock();
            if !state.disposing {
                state.disposing = true;
                info!(depth = state.queue.len(), "admission queue shutting down");
            }
        }

        while let Some(request) = self.take_for_drain() {
            self.sink.reject(request, RejectReason::ShuttingDown);
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().queue.is_empty()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.lock().disposing
    }

    pub fn config(&self) -> &AdmissionConfig {
        &self.config
    }

    pub fn stats(&self) -> &AdmissionStats {
        &self.stats
    }

    fn enqueue(&self, state: &mut QueueState<R>, request: R) -> Option<(R, RejectReason)> {
        let limit = self.config.capacity_limit();
        if state.queue.len() >= limit {
            return Some((request, RejectReason::CapacityExceeded { limit }));
        }

        state.queue.push_back(request);
        self.stats.record_enqueue(state.queue.len());
        None
    }

    fn take_for_drain(&self) -> Option<R> {
        let mut state = self.state.lock();
        let request = state.queue.pop_front()?;
        self.stats.record_drained(state.queue.len());
        Some(request)
    }

    fn reject(&self, request: R, reason: RejectReason) {
        match reason {
            RejectReason::CapacityExceeded { limit } => {
                warn!(limit, "request queue is full, rejecting request");
                self.stats.record_rejected_full();
            }
            RejectReason::ShuttingDown => {
                trace!("shutting down, rejecting request");
                self.stats.record_rejected_shutdown();
            }
        }
        self.sink.reject(request, reason);
    }
}

impl<R, P, S> fmt::Debug for AdmissionQueue<R, P, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdmissionQueue").field("config", &self.config).field("stats", &self.stats).finish_non_exhaustive()
    }
}
