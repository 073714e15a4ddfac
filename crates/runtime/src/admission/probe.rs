use std::net::{IpAddr, SocketAddr};

use http::{Request, StatusCode};
use thiserror::Error;

/// A unit of work waiting for admission.
pub trait PendingRequest {
    /// Address of the peer, if known.
    fn remote_addr(&self) -> Option<IpAddr>;

    /// Local requests may use the lower free worker threshold.
    fn is_local(&self) -> bool {
        self.remote_addr().is_some_and(|addr| addr.to_canonical().is_loopback())
    }
}

/// Requests carry their peer as a [`SocketAddr`] extension, when the connection layer
/// provides one.
impl<B> PendingRequest for Request<B> {
    fn remote_addr(&self) -> Option<IpAddr> {
        self.extensions().get::<SocketAddr>().map(SocketAddr::ip)
    }
}

/// Reports how many workers could pick up a request right now.
///
/// The value is read without holding the queue lock and may be stale.
pub trait CapacityProbe {
    fn free_workers(&self) -> usize;
}

impl<F> CapacityProbe for F
where
    F: Fn() -> usize,
{
    fn free_workers(&self) -> usize {
        self()
    }
}

/// Receives every request the queue gives up on.
///
/// A sink is called outside the queue lock, once per rejected request.
pub trait RejectionSink<R> {
    fn reject(&self, request: R, reason: RejectReason);
}

impl<R, F> RejectionSink<R> for F
where
    F: Fn(R, RejectReason),
{
    fn reject(&self, request: R, reason: RejectReason) {
        self(request, reason);
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    #[error("request queue is full, limit: {limit}")]
    CapacityExceeded { limit: usize },

    #[error("server is shutting down")]
    ShuttingDown,
}

impl RejectReason {
    /// Status to answer a rejected request with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RejectReason::CapacityExceeded { .. } | RejectReason::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
