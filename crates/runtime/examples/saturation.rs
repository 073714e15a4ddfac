use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use gatehouse_http::form::FormData;
use gatehouse_runtime::admission::RejectReason;
use gatehouse_runtime::config::AdmissionConfig;
use gatehouse_runtime::dispatch::{Dispatcher, WorkerPool, make_executor, service_unavailable};
use http::Request;
use http::header::CONTENT_TYPE;
use http_body_util::Full;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

const BOUNDARY: &str = "gatehouse-demo";

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = match AdmissionConfig::builder().min_free_workers(1).min_free_workers_for_local(0).capacity_limit(4).build() {
        Ok(config) => config,
        Err(e) => {
            error!(cause = %e, "invalid admission config");
            return;
        }
    };

    let executor = make_executor(|request: Request<Full<Bytes>>| async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        match FormData::from_request(request).await {
            Ok(form) => info!(user = form.field("user").unwrap_or_default(), files = form.files().len(), "form handled"),
            Err(e) => warn!(cause = %e, "bad form"),
        }
    });

    let sink = |request: Request<Full<Bytes>>, reason: RejectReason| {
        let response = service_unavailable();
        warn!(uri = %request.uri(), %reason, status = %response.status(), "request rejected");
    };

    let dispatcher = match Dispatcher::new(config, WorkerPool::new(3), executor, sink) {
        Ok(dispatcher) => dispatcher,
        Err(e) => {
            error!(cause = %e, "invalid worker pool");
            return;
        }
    };
    let timer = dispatcher.spawn_drain_timer(Duration::from_millis(20));

    for n in 0..12u16 {
        // every third request comes from the local machine
        let peer = if n % 3 == 0 { SocketAddr::from(([127, 0, 0, 1], 40000 + n)) } else { SocketAddr::from(([203, 0, 113, 5], 40000 + n)) };
        dispatcher.process_request(upload(n, peer));
        info!(n, depth = dispatcher.queue().stats().depth(), free = dispatcher.pool().available(), "request submitted");
    }

    tokio::time::sleep(Duration::from_millis(400)).await;

    let stats = dispatcher.queue().stats();
    info!(queued = stats.queued(), dequeued = stats.dequeued(), rejected_full = stats.rejected_full(), "shutting down");
    dispatcher.shutdown();
    if let Err(e) = timer.await {
        error!(cause = %e, "drain timer failed");
    }
}

fn upload(n: u16, peer: SocketAddr) -> Request<Full<Bytes>> {
    let body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user\"\r\n\r\nuser-{n}\r\n\
         --{BOUNDARY}\r\nContent-Disposition: form-data; name=\"report\"; filename=\"C:\\reports\\{n}.csv\"\r\n\
         Content-Type: text/csv\r\n\r\nid,value\r\n{n},42\r\n--{BOUNDARY}--\r\n"
    );

    let mut request = Request::builder()
        .uri(format!("/upload/{n}"))
        .header(CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Full::new(Bytes::from(body)))
        .expect("valid request");
    request.extensions_mut().insert(peer);
    request
}
