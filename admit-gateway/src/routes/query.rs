//! Query service: submit text, get the first-row scalar.

use std::sync::Arc;

use admit_core::AdmissionGate;
use admit_query::{QueryExecutor, QueryOutcome, QueryService, SqlGrammarValidator};
use axum::{
    extract::{DefaultBodyLimit, FromRef, State},
    response::{Html, IntoResponse, Response},
    routing::get,
    Form, Router,
};
use serde::Deserialize;

use super::{challenge, health, plain_text};
use crate::error::{GatewayError, Surface};
use crate::telemetry::http_trace_layer;

/// Ceiling on the urlencoded form body.
pub const MAX_FORM_BYTES: usize = 4 * 1024;

const EMPTY_SET: &str = "Empty set";
const QUERY_FAILED: &str = "Error: <b> Query failed </b>";

/// The store behind the service, behind a trait object.
pub type SharedQueryService = QueryService<SqlGrammarValidator, Arc<dyn QueryExecutor>>;

// ── Shared state ─────────────────────────────────────────────────────────────

/// Gate plus query service, shared by every request.
#[derive(Clone)]
pub struct QueryState {
    pub gate: AdmissionGate,
    pub service: Arc<SharedQueryService>,
    /// Pass the store's own error text through to the client.
    pub expose_store_errors: bool,
}

impl FromRef<QueryState> for AdmissionGate {
    fn from_ref(state: &QueryState) -> Self {
        state.gate.clone()
    }
}

// ── Request types ─────────────────────────────────────────────────────────────

/// `POST /` form. Missing fields read as empty.
#[derive(Debug, Default, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub sql: String,
    #[serde(default)]
    pub pow: String,
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the query service router.
pub fn query_router(state: QueryState) -> Router {
    Router::new()
        .route("/", get(challenge).post(submit))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_FORM_BYTES))
        .with_state(state)
        .layer(http_trace_layer())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

/// `POST /`: gate the request, then screen and forward the text.
///
/// # Errors
/// Returns [`GatewayError::WrongPow`] on a bad token and
/// [`GatewayError::QueryRejected`] when the filter refuses the text.
pub async fn submit(
    State(state): State<QueryState>,
    Form(form): Form<QueryForm>,
) -> Result<Response, GatewayError> {
    state.gate.admit(&form.pow).map_err(|_| GatewayError::WrongPow(Surface::Query))?;

    let outcome = state.service.handle(&form.sql).await.map_err(GatewayError::QueryRejected)?;
    Ok(match outcome {
        QueryOutcome::Scalar(value) => plain_text(value),
        QueryOutcome::EmptySet => Html(EMPTY_SET).into_response(),
        QueryOutcome::StoreFailed(message) if state.expose_store_errors => plain_text(message),
        QueryOutcome::StoreFailed(_) => Html(QUERY_FAILED).into_response(),
    })
}
