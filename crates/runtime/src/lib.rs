//! Request admission for the gatehouse web runtime
//!
//! This crate decides when incoming requests may run. Requests arriving while too few
//! workers are free wait in a bounded FIFO queue and run in arrival order as workers free
//! up; requests that do not fit are rejected with `503 Service Unavailable`.
//!
//! # Features
//!
//! - Free worker thresholds, with a lower one for requests from loopback peers
//! - Bounded FIFO queue with a pluggable rejection sink
//! - Shutdown that rejects every waiting request exactly once
//! - Queue depth and rejection counters per queue
//! - A tokio dispatcher running admitted requests on a fixed worker pool
//!
//! # Example
//!
//! ```no_run
//! use std::net::SocketAddr;
//! use http::Request;
//! use gatehouse_runtime::admission::RejectReason;
//! use gatehouse_runtime::config::{AdmissionConfig, ConfigError};
//! use gatehouse_runtime::dispatch::{Dispatcher, WorkerPool, make_executor};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ConfigError> {
//!     let executor = make_executor(|request: Request<String>| async move {
//!         tracing::info!(uri = %request.uri(), "handling request");
//!     });
//!     let sink = |request: Request<String>, reason: RejectReason| {
//!         tracing::warn!(uri = %request.uri(), %reason, "request rejected");
//!     };
//!
//!     let dispatcher = Dispatcher::new(AdmissionConfig::default(), WorkerPool::new(64), executor, sink)?;
//!
//!     let mut request = Request::new(String::new());
//!     request.extensions_mut().insert(SocketAddr::from(([127, 0, 0, 1], 50000)));
//!     dispatcher.process_request(request);
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`admission`]: [`admission::AdmissionQueue`] and the traits it is built on
//! - [`dispatch`]: worker pool, executors and the [`dispatch::Dispatcher`]
//! - [`config`]: [`config::AdmissionConfig`] thresholds

pub mod admission;
pub mod config;
pub mod dispatch;
