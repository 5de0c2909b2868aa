//! Tracing setup shared by both binaries.

use axum::http::{HeaderMap, Request};
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{MakeSpan, TraceLayer};
use tracing::Span;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` overrides the `info` default.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Request span carrying the proxy's client address and the user agent.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or("-")
}

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let headers = request.headers();
        tracing::info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path(),
            real_ip = %header(headers, "x-real-ip"),
            user_agent = %header(headers, "user-agent"),
        )
    }
}

/// HTTP trace layer used by both routers.
#[must_use]
pub fn http_trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan> {
    TraceLayer::new_for_http().make_span_with(RequestSpan)
}
