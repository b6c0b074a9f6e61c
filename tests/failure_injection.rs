//! Failure injection tests for the request logging layer and the logger.

use axum::body::{Body, Bytes};
use axum::http::{Request, Response, StatusCode};
use axum::routing::get;
use axum::Router;
use http_body::Frame;
use http_body_util::BodyExt;
use request_logger::http::{ExchangeEvent, Severity};
use request_logger::sink::logger::OutputKind;
use request_logger::sink::{LogCall, MemorySink};
use request_logger::{Logger, RequestLoggingLayer, Sink};
use std::io::{self, Write};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tower::{service_fn, Layer, ServiceExt};
use tower_http::timeout::TimeoutLayer;

mod common;

/// Writer whose every write fails.
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "injected"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Yields one chunk, then fails.
struct Faulty {
    sent: bool,
}

impl http_body::Body for Faulty {
    type Data = Bytes;
    type Error = io::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, io::Error>>> {
        if self.sent {
            Poll::Ready(Some(Err(io::Error::new(io::ErrorKind::ConnectionReset, "injected"))))
        } else {
            self.sent = true;
            Poll::Ready(Some(Ok(Frame::data(Bytes::from_static(b"head")))))
        }
    }
}

#[test]
fn test_failing_output_does_not_block_others() {
    let good = Captured::default();
    let logger = Logger::builder("api")
        .output(OutputKind::Writer("broken".into()), Box::new(BrokenPipe), None)
        .output(OutputKind::Console, Box::new(good.clone()), None)
        .build();

    logger.error("disk full");

    let text = String::from_utf8(good.0.lock().unwrap().clone()).unwrap();
    assert_eq!(text, "[ERROR] (api)\ndisk full\n");
}

#[tokio::test]
async fn test_inner_service_error_is_aborted() {
    let sink = Arc::new(MemorySink::new());
    let svc = RequestLoggingLayer::builder(sink.clone()).build().layer(service_fn(
        |_req: Request<Body>| async { Err::<Response<Body>, io::Error>(io::Error::other("upstream")) },
    ));

    let result = svc.oneshot(Request::new(Body::empty())).await;
    assert!(result.is_err());

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.event, ExchangeEvent::Aborted);
    assert_eq!(entries[0].1.status_code, 0);
}

#[tokio::test]
async fn test_body_stream_error_is_aborted() {
    let sink = Arc::new(MemorySink::new());
    let svc = RequestLoggingLayer::builder(sink.clone()).build().layer(service_fn(
        |_req: Request<Body>| async {
            let res = Response::builder().status(502).body(Faulty { sent: false }).unwrap();
            Ok::<_, io::Error>(res)
        },
    ));

    let res = svc.oneshot(Request::new(Body::empty())).await.unwrap();
    let collected = res.into_body().collect().await;
    assert!(collected.is_err());

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].0, Severity::Error);
    assert_eq!(entries[0].1.event, ExchangeEvent::Aborted);
    assert_eq!(entries[0].1.status_code, 502);
}

#[tokio::test]
async fn test_request_body_read_failure_reaches_handler() {
    let sink = Arc::new(MemorySink::new());
    let svc = RequestLoggingLayer::builder(sink.clone())
        .include_body(true)
        .build()
        .layer(service_fn(|req: Request<Body>| async move {
            let status = match axum::body::to_bytes(req.into_body(), usize::MAX).await {
                Ok(_) => StatusCode::OK,
                Err(_) => StatusCode::BAD_REQUEST,
            };
            Ok::<_, io::Error>(Response::builder().status(status).body(Body::empty()).unwrap())
        }));

    let req = Request::builder()
        .method("POST")
        .uri("/upload")
        .header("content-length", "10")
        .body(Body::new(Faulty { sent: false }))
        .unwrap();
    let res = svc.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    drop(res);

    let entries = sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].1.status_code, 400);
    assert_eq!(entries[0].1.event, ExchangeEvent::Completed);
    assert_eq!(entries[0].1.request_body, None);
}

#[tokio::test]
#[allow(deprecated)]
async fn test_timed_out_handler_is_logged_as_completed_408() {
    let sink = Arc::new(MemorySink::new());
    let router = Router::new()
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        )
        .layer(TimeoutLayer::new(Duration::from_millis(50)))
        .layer(RequestLoggingLayer::builder(sink.clone()).build());
    let addr = common::start_server(router).await;

    let res = reqwest::get(format!("http://{}/slow", addr)).await.unwrap();
    assert_eq!(res.status(), StatusCode::REQUEST_TIMEOUT.as_u16());
    let _ = res.bytes().await.unwrap();

    assert!(common::wait_for_calls(&sink, 1).await);
    let entries = sink.entries();
    assert_eq!(entries[0].0, Severity::Warn);
    assert_eq!(entries[0].1.status_code, 408);
    assert_eq!(entries[0].1.event, ExchangeEvent::Completed);
}

#[tokio::test]
async fn test_sink_without_error_method_warns_once() {
    let sink = Arc::new(MemorySink::with_capabilities(&[Severity::Info, Severity::Warn], true));
    let layer = RequestLoggingLayer::builder(sink.clone()).build();
    let addr = common::start_demo(layer.clone()).await;

    let client = reqwest::Client::new();
    for _ in 0..3 {
        let res = client
            .get(format!("http://{}/status/500", addr))
            .send()
            .await
            .unwrap();
        let _ = res.text().await.unwrap();
    }

    assert!(common::wait_for_calls(&sink, 4).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let calls = sink.calls();
    let warnings: Vec<_> = calls.iter().filter(|c| c.severity == Severity::Warn).collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(
        warnings[0].call.message_text(),
        "Unknown log method \"error\"; routing the call to \"info\" instead"
    );
    assert_eq!(sink.entries().len(), 3);
    assert!(sink.entries().iter().all(|(severity, _)| *severity == Severity::Info));
    assert!(layer.dispatcher().has_warned("error"));
}

#[tokio::test]
async fn test_sink_with_only_generic_entry_point() {
    let sink = Arc::new(MemorySink::with_capabilities(&[], true));
    let svc = RequestLoggingLayer::builder(sink.clone())
        .build()
        .layer(service_fn(|_req: Request<Body>| async {
            Ok::<_, io::Error>(Response::new(Body::from("ok")))
        }));

    let res = svc
        .oneshot(Request::builder().uri("/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let _ = res.into_body().collect().await.unwrap();

    let lines = sink.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].0, Severity::Warn);
    assert_eq!(lines[1].0, Severity::Info);
    assert!(lines[1].1.starts_with("GET /ping 200 "));
    assert!(!sink.write(Severity::Info, &LogCall::new("x")).is_handled());
}
