//! Shared utilities for integration tests.

use axum::Router;
use request_logger::http::server::DemoServer;
use request_logger::sink::MemorySink;
use request_logger::RequestLoggingLayer;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Serve `router` on an ephemeral port with connect info.
pub async fn start_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let app = router.into_make_service_with_connect_info::<SocketAddr>();
        let _ = axum::serve(listener, app).await;
    });

    addr
}

/// Serve the demo router wrapped by `layer`.
#[allow(dead_code)]
pub async fn start_demo(layer: RequestLoggingLayer) -> SocketAddr {
    start_server(DemoServer::new(layer, Duration::from_secs(5)).router()).await
}

/// Poll until the sink holds `count` calls, or give up after five seconds.
#[allow(dead_code)]
pub async fn wait_for_calls(sink: &Arc<MemorySink>, count: usize) -> bool {
    for _ in 0..500 {
        if sink.calls().len() >= count {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
