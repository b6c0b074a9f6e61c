//! Demo HTTP server.
//!
//! # Responsibilities
//! - Build an Axum router with a few demo handlers
//! - Wrap it with the request id, request logging, timeout and trace layers
//! - Serve a listener with connect info until Ctrl+C

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::http::observer::RequestLoggingLayer;
use crate::http::request::RequestIdLayer;

/// Path the demo server answers liveness probes on.
pub const HEALTH_PATH: &str = "/health";

/// Demo server fronted by the request logging layer.
pub struct DemoServer {
    router: Router,
}

impl DemoServer {
    pub fn new(logging: RequestLoggingLayer, request_timeout: Duration) -> Self {
        Self {
            router: Self::build_router(logging, request_timeout),
        }
    }

    /// Request ids are assigned before observation starts, so the id layer
    /// sits outside the logging layer.
    #[allow(deprecated)]
    fn build_router(logging: RequestLoggingLayer, request_timeout: Duration) -> Router {
        Router::new()
            .route("/", get(index))
            .route(HEALTH_PATH, get(health))
            .route("/echo", post(echo))
            .route("/status/{code}", get(status))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(logging)
            .layer(RequestIdLayer)
            .layer(TraceLayer::new_for_http())
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn index() -> &'static str {
    "request-logger demo\n"
}

async fn health() -> &'static str {
    "ok"
}

async fn echo(headers: axum::http::HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| header::HeaderValue::from_static("application/octet-stream"));
    let mut response = Response::new(Body::from(body));
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    response
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => (status, status.canonical_reason().unwrap_or("")).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "Invalid status code").into_response(),
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
