//! Running admitted requests on a fixed pool of workers.
//!
//! A [`Dispatcher`] puts every request through an [`AdmissionQueue`] whose capacity probe
//! is a [`WorkerPool`]. Admitted requests run on tokio while holding a pool permit. When a
//! request finishes, the worker asks the queue for the next waiting request, so the queue
//! drains as capacity frees up.
//!
//! The free worker count is read without coordination with the queue, so a request can be
//! queued just after the last worker looked for more work. [`Dispatcher::drain`] and
//! [`Dispatcher::spawn_drain_timer`] pick such requests up.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Empty;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::admission::{AdmissionQueue, CapacityProbe, PendingRequest, RejectionSink};
use crate::config::{AdmissionConfig, ConfigError};

/// A fixed number of worker slots.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        Self { permits: Arc::new(Semaphore::new(size)), size }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    fn try_acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).try_acquire_owned().ok()
    }

    /// Waits for a free slot. The semaphore is never closed, so `None` does not occur
    /// in practice; callers run the request regardless.
    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).acquire_owned().await.ok()
    }
}

impl CapacityProbe for WorkerPool {
    fn free_workers(&self) -> usize {
        self.available()
    }
}

#[async_trait]
pub trait RequestExecutor<R> {
    async fn execute(&self, request: R);
}

#[derive(Debug)]
pub struct ExecutorFn<F> {
    f: F,
}

#[async_trait]
impl<R, F, Fut> RequestExecutor<R> for ExecutorFn<F>
where
    R: Send + 'static,
    F: Fn(R) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn execute(&self, request: R) {
        (self.f)(request).await;
    }
}

pub fn make_executor<F, R, Fut>(f: F) -> ExecutorFn<F>
where
    F: Fn(R) -> Fut,
    Fut: Future<Output = ()>,
{
    ExecutorFn { f }
}

/// Response for a request the queue rejected.
pub fn service_unavailable() -> Response<Empty<Bytes>> {
    let mut response = Response::new(Empty::new());
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
}

pub struct Dispatcher<R, E, S> {
    queue: Arc<AdmissionQueue<R, WorkerPool, S>>,
    pool: WorkerPool,
    executor: Arc<E>,
}

impl<R, E, S> Dispatcher<R, E, S>
where
    R: PendingRequest + Send + 'static,
    E: RequestExecutor<R> + Send + Sync + 'static,
    S: RejectionSink<R> + Send + Sync + 'static,
{
    /// # Errors
    ///
    /// [`ConfigError::PoolTooSmall`] if the pool can never have more than
    /// `min_free_workers` free workers, in which case remote requests would wait forever.
    pub fn new(config: AdmissionConfig, pool: WorkerPool, executor: E, sink: S) -> Result<Self, ConfigError> {
        if pool.size() <= config.min_free_workers() {
            return Err(ConfigError::PoolTooSmall { pool_size: pool.size(), min_free_workers: config.min_free_workers() });
        }

        let queue = Arc::new(AdmissionQueue::new(config, pool.clone(), sink));
        Ok(Self { queue, pool, executor: Arc::new(executor) })
    }

    /// Admits `request` and starts whatever the queue says should run now.
    ///
    /// Must be called within a tokio runtime.
    pub fn process_request(&self, request: R) {
        if let Some(request) = self.queue.admit(Some(request)) {
            self.dispatch(request);
        }
    }

    /// Starts queued requests while capacity allows, returning how many were started.
    pub fn drain(&self) -> usize {
        let mut started = 0;
        while let Some(request) = self.queue.admit(None) {
            self.dispatch(request);
            started += 1;
        }
        started
    }

    /// Calls [`drain`](Self::drain) every `period` until shutdown.
    pub fn spawn_drain_timer(&self, period: Duration) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if dispatcher.queue.is_shutting_down() {
                    break;
                }
                let started = dispatcher.drain();
                if started > 0 {
                    debug!(started, "drain timer started queued requests");
                }
            }
        })
    }

    /// Rejects all queued requests. Running requests are left to finish.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    pub fn queue(&self) -> &AdmissionQueue<R, WorkerPool, S> {
        &self.queue
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    fn dispatch(&self, request: R) {
        let reserved = self.pool.try_acquire();
        let queue = Arc::clone(&self.queue);
        let pool = self.pool.clone();
        let executor = Arc::clone(&self.executor);

        tokio::spawn(async move {
            let mut reserved = reserved;
            let mut next = Some(request);

            while let Some(request) = next {
                let permit = match reserved.take() {
                    Some(permit) => Some(permit),
                    None => pool.acquire().await,
                };

                trace!(free = pool.available(), "executing request");
                executor.execute(request).await;
                drop(permit);

                next = queue.admit(None);
            }
        });
    }
}

impl<R, E, S> Clone for Dispatcher<R, E, S> {
    fn clone(&self) -> Self {
        Self { queue: Arc::clone(&self.queue), pool: self.pool.clone(), executor: Arc::clone(&self.executor) }
    }
}

impl<R, E, S> fmt::Debug for Dispatcher<R, E, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").field("queue", &self.queue).field("pool", &self.pool).finish_non_exhaustive()
    }
}
