//! Request-scoped context for one callback
//!
//! Each inbound callback gets its own [`RequestContext`] carrying a request
//! id and a `tracing` span. Everything the flow logs is emitted inside that
//! span, so log lines from concurrent callbacks stay attributable without
//! any shared logging state.

use std::time::{Duration, Instant};

use tracing::Span;
use uuid::Uuid;

/// Context threaded through a single callback request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    started: Instant,
    span: Span,
}

impl RequestContext {
    /// Creates a context with a fresh request id.
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4())
    }

    /// Creates a context for a known request id.
    pub fn with_id(request_id: Uuid) -> Self {
        let span = tracing::info_span!("oauth_callback", request_id = %request_id);
        Self {
            request_id,
            started: Instant::now(),
            span,
        }
    }

    /// The request id.
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The span all flow logging for this request is recorded in.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Time since the request was received.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}
