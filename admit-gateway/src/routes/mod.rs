//! Axum routers for the two services.
//!
//! Both expose the same discovery surface: `GET /` returns the current
//! proof-of-work challenge and `GET /health` is a liveness probe. `POST /`
//! differs per service.

pub mod exec;
pub mod query;

use admit_core::{AdmissionGate, Challenge};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

pub use exec::{exec_router, ExecState};
pub use query::{query_router, QueryState};

/// `GET /health`: liveness probe.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "ok"})))
}

/// `GET /`: the public `{prefix, challenge}` pair.
pub async fn challenge(State(gate): State<AdmissionGate>) -> Json<Challenge> {
    Json(gate.challenge())
}

/// Declared body length, if the client sent a usable one.
pub(crate) fn content_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Untrusted bytes served so the browser never interprets them as markup.
pub(crate) fn plain_text(body: impl Into<axum::body::Body>) -> Response {
    ([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body.into()).into_response()
}
