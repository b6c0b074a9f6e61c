//! Response body wrapper that delivers the completion and abort signals.

use axum::body::Bytes;
use http_body::{Body, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::http::observer::ExchangeGuard;

/// Response body of an observed exchange.
///
/// Reaching the end of the inner body completes the exchange; a body error,
/// or dropping the body before its end, aborts it.
pub struct ObservedBody<B> {
    inner: Pin<Box<B>>,
    guard: ExchangeGuard,
}

impl<B: Body> ObservedBody<B> {
    pub(crate) fn new(inner: B, guard: ExchangeGuard) -> Self {
        let mut body = Self {
            inner: Box::pin(inner),
            guard,
        };
        // Transports may never poll a body that is already finished.
        if body.inner.is_end_stream() {
            body.guard.complete();
        }
        body
    }

    /// A body for a request that bypassed observation.
    pub(crate) fn passthrough(inner: B) -> Self {
        Self {
            inner: Box::pin(inner),
            guard: ExchangeGuard::inert(),
        }
    }
}

impl<B: Body> Body for ObservedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let poll = this.inner.as_mut().poll_frame(cx);
        match &poll {
            Poll::Ready(None) => this.guard.complete(),
            Poll::Ready(Some(Ok(_))) => {
                if this.inner.is_end_stream() {
                    this.guard.complete();
                }
            }
            Poll::Ready(Some(Err(_))) => this.guard.abort(),
            Poll::Pending => {}
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Request body that hands an earlier read failure to the inner service.
pub(crate) struct ReplayedError {
    error: Option<axum::Error>,
}

impl ReplayedError {
    pub(crate) fn new(error: axum::Error) -> Self {
        Self { error: Some(error) }
    }
}

impl Body for ReplayedError {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Poll::Ready(self.get_mut().error.take().map(Err))
    }
}
