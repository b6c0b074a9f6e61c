//! Request lifecycle observation.
//!
//! # Responsibilities
//! - Start a timer when a request is accepted for observation
//! - Turn the first of two signals (response body finished, exchange
//!   dropped early) into exactly one [`LogEntry`]
//! - Resolve identifiers, severity, headers, body and enrichment context
//! - Hand the entry to the sink through a [`FallbackDispatcher`]
//!
//! # Design Decisions
//! - The guard is created synchronously in `call`, so a future dropped
//!   before its first poll still reports an aborted exchange
//! - A two-state latch decides which signal wins; the winner takes the
//!   exchange out of the guard so the other signal has nothing left to fire
//! - No timeout: an exchange that never completes and is never dropped is
//!   never logged
//! - Skipped requests get no timer and no guard

use axum::body::Body;
use axum::extract::{ConnectInfo, OriginalUri};
use axum::http::{header, HeaderMap, Method, Request, Response, StatusCode, Uri};
use http_body::Body as HttpBody;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::{Layer, Service};

use crate::config::schema::LoggerConfig;
use crate::http::body::{ObservedBody, ReplayedError};
use crate::http::entry::{default_message, round_ms, ExchangeEvent, LogEntry};
use crate::http::headers::{normalize_header_map, HeaderInclusion};
use crate::http::level::{LevelResolver, Severity};
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::redaction::{MaskedKeys, Payload, RedactingSerializer, Serialized};
use crate::sink::{FallbackDispatcher, LogCall, Sink};

pub type SkipFn = Arc<dyn Fn(&Request<Body>) -> bool + Send + Sync>;
pub type MessageFn = Arc<dyn Fn(&LogEntry) -> String + Send + Sync>;
pub type EnrichFn =
    Arc<dyn Fn(&RequestSnapshot, Option<&ResponseSnapshot>, f64) -> Map<String, Value> + Send + Sync>;

const ARMED: u8 = 0;
const FINALIZED: u8 = 1;

/// Armed → Finalized, once.
#[derive(Debug, Default)]
pub struct Latch(AtomicU8);

impl Latch {
    pub fn new() -> Self {
        Self(AtomicU8::new(ARMED))
    }

    /// Returns true for the single caller that moves the latch to Finalized.
    pub fn try_finalize(&self) -> bool {
        self.0
            .compare_exchange(ARMED, FINALIZED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_finalized(&self) -> bool {
        self.0.load(Ordering::Acquire) == FINALIZED
    }
}

/// What the observer kept of the request.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub request_id: Option<String>,
    pub content_length: Option<u64>,
    body: Option<Serialized>,
}

impl RequestSnapshot {
    fn capture(req: &Request<Body>) -> Self {
        let headers = req.headers();
        let uri = req
            .extensions()
            .get::<OriginalUri>()
            .map(|original| original.0.clone())
            .unwrap_or_else(|| req.uri().clone());

        let ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .or_else(|| {
                header_str(headers, "x-forwarded-for")
                    .and_then(|v| v.split(',').next())
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(String::from)
            })
            .or_else(|| header_str(headers, "x-real-ip").map(String::from));

        let user_agent = header_str(headers, header::USER_AGENT.as_str())
            .or_else(|| header_str(headers, "x-original-user-agent"))
            .map(String::from);

        let request_id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.0.clone())
            .or_else(|| header_str(headers, X_REQUEST_ID).map(String::from));

        Self {
            method: req.method().clone(),
            uri,
            headers: headers.clone(),
            ip,
            user_agent,
            request_id,
            content_length: content_length(headers),
            body: None,
        }
    }

    /// The serialized request body, when captured.
    pub fn body(&self) -> Option<&Serialized> {
        self.body.as_ref()
    }
}

/// What the observer kept of the response head.
#[derive(Debug, Clone)]
pub struct ResponseSnapshot {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, header::CONTENT_LENGTH.as_str()).and_then(|v| v.trim().parse().ok())
}

/// Read-only configuration shared by every exchange of one layer.
struct ObserverShared {
    sink: FallbackDispatcher<Arc<dyn Sink>>,
    serializer: RedactingSerializer,
    include_body: bool,
    max_body_buffer_bytes: usize,
    request_headers: HeaderInclusion,
    response_headers: HeaderInclusion,
    levels: LevelResolver,
    message: Option<MessageFn>,
    enrich: Option<EnrichFn>,
    skip: Option<SkipFn>,
    enabled: bool,
}

/// State of one observed exchange.
struct Exchange {
    shared: Arc<ObserverShared>,
    latch: Latch,
    started: Instant,
    request: RequestSnapshot,
    response: Option<ResponseSnapshot>,
}

impl Exchange {
    fn finalize(&self, event: ExchangeEvent) {
        if !self.latch.try_finalize() {
            return;
        }
        let shared = &self.shared;

        let elapsed = round_ms(self.started.elapsed().as_secs_f64() * 1000.0);
        let status = self.response.as_ref().map(|r| r.status.as_u16()).unwrap_or(0);
        let severity = shared.levels.resolve(status);

        let mut entry = LogEntry::new(event);
        entry.method = self.request.method.to_string();
        entry.url = self.request.uri.to_string();
        entry.status_code = status;
        entry.response_time_ms = elapsed;
        entry.content_length = self
            .response
            .as_ref()
            .and_then(|r| r.content_length)
            .or(self.request.content_length);
        entry.ip = self.request.ip.clone();
        entry.user_agent = self.request.user_agent.clone();
        entry.request_id = self.request.request_id.clone();
        entry.request_body = self.request.body.clone().map(Serialized::into_value);
        entry.request_headers = normalize_header_map(&self.request.headers, &shared.request_headers);

        let no_headers = HeaderMap::new();
        let response_headers = self.response.as_ref().map(|r| &r.headers).unwrap_or(&no_headers);
        entry.response_headers = normalize_header_map(response_headers, &shared.response_headers);

        if let Some(enrich) = &shared.enrich {
            let extra = enrich(&self.request, self.response.as_ref(), elapsed);
            entry.context.get_or_insert_with(Map::new).extend(extra);
        }

        let message = match &shared.message {
            Some(build) => build(&entry),
            None => default_message(&entry),
        };

        tracing::trace!(
            method = %entry.method,
            url = %entry.url,
            status,
            event = %event,
            "Exchange finalized"
        );

        let call = LogCall::new(message).with_metadata(entry.to_fields());
        shared.sink.dispatch(severity, &call);
    }
}

/// Holds the exchange until one of its signals fires.
///
/// [`complete`](Self::complete) is the normal-completion signal; dropping
/// the guard while still armed is the abort signal.
pub(crate) struct ExchangeGuard {
    exchange: Option<Exchange>,
}

impl ExchangeGuard {
    fn new(exchange: Exchange) -> Self {
        Self {
            exchange: Some(exchange),
        }
    }

    pub(crate) fn inert() -> Self {
        Self { exchange: None }
    }

    fn exchange_mut(&mut self) -> Option<&mut Exchange> {
        self.exchange.as_mut()
    }

    pub(crate) fn complete(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.finalize(ExchangeEvent::Completed);
        }
    }

    pub(crate) fn abort(&mut self) {
        if let Some(exchange) = self.exchange.take() {
            exchange.finalize(ExchangeEvent::Aborted);
        }
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Builder for [`RequestLoggingLayer`].
pub struct RequestLoggingBuilder {
    sink: Arc<dyn Sink>,
    include_body: bool,
    max_body_buffer_bytes: usize,
    request_headers: HeaderInclusion,
    response_headers: HeaderInclusion,
    masked_keys: MaskedKeys,
    max_body_length: usize,
    levels: LevelResolver,
    message: Option<MessageFn>,
    enrich: Option<EnrichFn>,
    skip: Option<SkipFn>,
    enabled: bool,
}

impl RequestLoggingBuilder {
    fn new(sink: Arc<dyn Sink>) -> Self {
        let defaults = crate::config::schema::RequestLoggingConfig::default();
        Self {
            sink,
            include_body: defaults.include_body,
            max_body_buffer_bytes: defaults.max_body_buffer_bytes,
            request_headers: defaults.include_request_headers,
            response_headers: defaults.include_response_headers,
            masked_keys: MaskedKeys::new(&defaults.masked_keys),
            max_body_length: defaults.max_body_length,
            levels: LevelResolver::new(),
            message: None,
            enrich: None,
            skip: None,
            enabled: true,
        }
    }

    fn from_config(config: &LoggerConfig, sink: Arc<dyn Sink>) -> Self {
        let request = &config.request;
        let mut builder = Self::new(sink)
            .include_body(request.include_body)
            .max_body_buffer_bytes(request.max_body_buffer_bytes)
            .request_headers(request.include_request_headers.clone())
            .response_headers(request.include_response_headers.clone())
            .masked_keys(&request.masked_keys)
            .max_body_length(request.max_body_length)
            .enabled(config.environment.is_enabled());
        if let Some(level) = request.level {
            builder = builder.level(level);
        }
        builder
    }

    pub fn include_body(mut self, include: bool) -> Self {
        self.include_body = include;
        self
    }

    pub fn max_body_buffer_bytes(mut self, bytes: usize) -> Self {
        self.max_body_buffer_bytes = bytes;
        self
    }

    pub fn request_headers(mut self, include: impl Into<HeaderInclusion>) -> Self {
        self.request_headers = include.into();
        self
    }

    pub fn response_headers(mut self, include: impl Into<HeaderInclusion>) -> Self {
        self.response_headers = include.into();
        self
    }

    pub fn masked_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.masked_keys = MaskedKeys::new(keys);
        self
    }

    pub fn max_body_length(mut self, max: usize) -> Self {
        self.max_body_length = max;
        self
    }

    /// Fixed severity for every entry.
    pub fn level(mut self, severity: Severity) -> Self {
        self.levels = self.levels.fixed(severity);
        self
    }

    /// Severity computed from the final status code; wins over [`level`](Self::level).
    pub fn level_fn<F>(mut self, f: F) -> Self
    where
        F: Fn(u16) -> Severity + Send + Sync + 'static,
    {
        self.levels = self.levels.dynamic(f);
        self
    }

    pub fn message<F>(mut self, f: F) -> Self
    where
        F: Fn(&LogEntry) -> String + Send + Sync + 'static,
    {
        self.message = Some(Arc::new(f));
        self
    }

    /// Fields merged into the entry's `context`.
    pub fn enrich<F>(mut self, f: F) -> Self
    where
        F: Fn(&RequestSnapshot, Option<&ResponseSnapshot>, f64) -> Map<String, Value>
            + Send
            + Sync
            + 'static,
    {
        self.enrich = Some(Arc::new(f));
        self
    }

    /// Requests for which `f` returns true are not observed.
    pub fn skip<F>(mut self, f: F) -> Self
    where
        F: Fn(&Request<Body>) -> bool + Send + Sync + 'static,
    {
        self.skip = Some(Arc::new(f));
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn build(self) -> RequestLoggingLayer {
        RequestLoggingLayer {
            shared: Arc::new(ObserverShared {
                sink: FallbackDispatcher::new(self.sink),
                serializer: RedactingSerializer::new(self.masked_keys, self.max_body_length),
                include_body: self.include_body,
                max_body_buffer_bytes: self.max_body_buffer_bytes,
                request_headers: self.request_headers,
                response_headers: self.response_headers,
                levels: self.levels,
                message: self.message,
                enrich: self.enrich,
                skip: self.skip,
                enabled: self.enabled,
            }),
        }
    }
}

/// Layer observing every request/response exchange.
#[derive(Clone)]
pub struct RequestLoggingLayer {
    shared: Arc<ObserverShared>,
}

impl RequestLoggingLayer {
    pub fn builder<S: Sink + 'static>(sink: Arc<S>) -> RequestLoggingBuilder {
        RequestLoggingBuilder::new(sink)
    }

    /// Builder seeded from `config.request` and `config.environment`.
    pub fn from_config<S: Sink + 'static>(config: &LoggerConfig, sink: Arc<S>) -> RequestLoggingBuilder {
        RequestLoggingBuilder::from_config(config, sink)
    }

    /// The dispatcher wrapping this layer's sink.
    pub fn dispatcher(&self) -> &FallbackDispatcher<Arc<dyn Sink>> {
        &self.shared.sink
    }
}

impl fmt::Debug for RequestLoggingLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLoggingLayer")
            .field("enabled", &self.shared.enabled)
            .field("include_body", &self.shared.include_body)
            .finish()
    }
}

impl<S> Layer<S> for RequestLoggingLayer {
    type Service = RequestLoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLoggingService {
            inner,
            shared: self.shared.clone(),
        }
    }
}

/// Service produced by [`RequestLoggingLayer`].
#[derive(Clone)]
pub struct RequestLoggingService<S> {
    inner: S,
    shared: Arc<ObserverShared>,
}

impl<S, ResBody> Service<Request<Body>> for RequestLoggingService<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ResBody: HttpBody + Send + 'static,
{
    type Response = Response<ObservedBody<ResBody>>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let shared = self.shared.clone();

        let bypass = !shared.enabled || shared.skip.as_ref().is_some_and(|skip| skip(&req));
        if bypass {
            tracing::trace!(uri = %req.uri(), "Request not observed");
            return Box::pin(async move {
                let response = inner.call(req).await?;
                Ok(response.map(ObservedBody::passthrough))
            });
        }

        let head_request = req.method() == Method::HEAD;
        let mut guard = ExchangeGuard::new(Exchange {
            shared: shared.clone(),
            latch: Latch::new(),
            started: Instant::now(),
            request: RequestSnapshot::capture(&req),
            response: None,
        });

        Box::pin(async move {
            let req = if shared.include_body {
                let (req, body) = capture_body(req, &shared).await;
                if let Some(exchange) = guard.exchange_mut() {
                    exchange.request.body = body;
                }
                req
            } else {
                req
            };

            match inner.call(req).await {
                Ok(response) => {
                    let (parts, body) = response.into_parts();
                    if let Some(exchange) = guard.exchange_mut() {
                        exchange.response = Some(ResponseSnapshot {
                            status: parts.status,
                            headers: parts.headers.clone(),
                            content_length: content_length(&parts.headers)
                                .or_else(|| body.size_hint().exact()),
                        });
                    }
                    // The transport drops these bodies without polling them.
                    if head_request || forbids_body(parts.status) {
                        guard.complete();
                    }
                    Ok(Response::from_parts(parts, ObservedBody::new(body, guard)))
                }
                Err(e) => {
                    guard.abort();
                    Err(e)
                }
            }
        })
    }
}

/// Buffer a declared, bounded request body, serialize it, and rebuild the
/// request for the inner service.
async fn capture_body(req: Request<Body>, shared: &ObserverShared) -> (Request<Body>, Option<Serialized>) {
    let declared = match content_length(req.headers()) {
        Some(len) => len,
        None => {
            tracing::debug!(uri = %req.uri(), "Request body not captured: no content-length");
            return (req, None);
        }
    };
    if declared == 0 {
        return (req, None);
    }
    if declared > shared.max_body_buffer_bytes as u64 {
        tracing::debug!(
            uri = %req.uri(),
            declared,
            limit = shared.max_body_buffer_bytes,
            "Request body not captured: too large"
        );
        return (req, None);
    }

    let (parts, body) = req.into_parts();
    match axum::body::to_bytes(body, shared.max_body_buffer_bytes).await {
        Ok(bytes) => {
            let payload = body_payload(&parts.headers, &bytes);
            let serialized = shared.serializer.serialize(&payload);
            (Request::from_parts(parts, Body::from(bytes)), Some(serialized))
        }
        Err(e) => {
            tracing::warn!(uri = %parts.uri, error = %e, "Failed to buffer request body");
            (Request::from_parts(parts, Body::new(ReplayedError::new(e))), None)
        }
    }
}

fn forbids_body(status: StatusCode) -> bool {
    status.is_informational() || status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED
}

fn body_payload(headers: &HeaderMap, bytes: &[u8]) -> Payload {
    let content_type = header_str(headers, header::CONTENT_TYPE.as_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if content_type.contains("json") {
        if let Ok(value) = serde_json::from_slice::<Value>(bytes) {
            return Payload::from(value);
        }
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(bytes) {
            return form_payload(pairs);
        }
    }
    Payload::Text(String::from_utf8_lossy(bytes).into_owned())
}

/// Form fields as a map; a repeated key becomes a list of its values.
fn form_payload(pairs: Vec<(String, String)>) -> Payload {
    let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
    for (key, value) in pairs {
        match grouped.iter_mut().find(|(name, _)| *name == key) {
            Some((_, values)) => values.push(value),
            None => grouped.push((key, vec![value])),
        }
    }
    Payload::map(grouped.into_iter().map(|(key, mut values)| {
        let value = if values.len() == 1 {
            Payload::Text(values.remove(0))
        } else {
            Payload::list(values.into_iter().map(Payload::Text))
        };
        (key, value)
    }))
}
