//! Execution service: upload a Go program, get its output.

use std::sync::Arc;

use admit_core::AdmissionGate;
use admit_sandbox::{BuildPipeline, ProcessRunner, ProgramOutcome, MAX_PROGRAM_BYTES};
use axum::{
    body::Bytes,
    extract::{multipart::MultipartError, DefaultBodyLimit, FromRef, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Router,
};

use super::{challenge, content_length, health, plain_text};
use crate::error::{GatewayError, Surface};
use crate::telemetry::http_trace_layer;

/// Ceiling on the whole upload request, multipart framing included.
pub const MAX_UPLOAD_BYTES: usize = MAX_PROGRAM_BYTES;

const BUILD_FAILED: &str = "Error while building: probably timeout, try again";

// ── Shared state ─────────────────────────────────────────────────────────────

/// Gate plus pipeline, shared by every request.
pub struct ExecState<R: ProcessRunner> {
    pub gate: AdmissionGate,
    pub pipeline: Arc<BuildPipeline<R>>,
}

impl<R: ProcessRunner> ExecState<R> {
    /// Bundle a gate and a pipeline.
    pub fn new(gate: AdmissionGate, pipeline: BuildPipeline<R>) -> Self {
        Self {
            gate,
            pipeline: Arc::new(pipeline),
        }
    }
}

impl<R: ProcessRunner> Clone for ExecState<R> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

impl<R: ProcessRunner> FromRef<ExecState<R>> for AdmissionGate {
    fn from_ref(state: &ExecState<R>) -> Self {
        state.gate.clone()
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Build the execution service router.
pub fn exec_router<R: ProcessRunner + 'static>(state: ExecState<R>) -> Router {
    Router::new()
        .route("/", get(challenge).post(upload::<R>))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
        .layer(http_trace_layer())
}

// ── Handlers ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct UploadForm {
    pow: Option<String>,
    file: Option<Bytes>,
}

fn multipart_error(e: &MultipartError) -> GatewayError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        GatewayError::PayloadTooLarge(Surface::Exec)
    } else {
        GatewayError::InvalidRequest(Surface::Exec, e.body_text())
    }
}

async fn read_upload(multipart: &mut Multipart) -> Result<UploadForm, GatewayError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| multipart_error(&e))? {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "pow" => form.pow = Some(field.text().await.map_err(|e| multipart_error(&e))?),
            "file" => form.file = Some(field.bytes().await.map_err(|e| multipart_error(&e))?),
            _ => {}
        }
    }
    Ok(form)
}

/// `POST /`: gate the upload, then hand the `file` field to the pipeline.
///
/// # Errors
/// Returns [`GatewayError::PayloadTooLarge`] above [`MAX_UPLOAD_BYTES`],
/// [`GatewayError::WrongPow`] on a bad token, [`GatewayError::MissingProgram`]
/// without a `file` field, [`GatewayError::ProgramRejected`] from the static
/// filter, and [`GatewayError::Sandbox`] on scratch or spawn failure.
pub async fn upload<R: ProcessRunner + 'static>(
    State(state): State<ExecState<R>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, GatewayError> {
    if content_length(&headers).is_some_and(|len| len > MAX_UPLOAD_BYTES) {
        return Err(GatewayError::PayloadTooLarge(Surface::Exec));
    }
    let form = read_upload(&mut multipart).await?;

    state
        .gate
        .admit(form.pow.as_deref().unwrap_or_default())
        .map_err(|_| GatewayError::WrongPow(Surface::Exec))?;
    let source = form.file.ok_or(GatewayError::MissingProgram)?;

    let report = state.pipeline.execute(&source).await?;
    match report.outcome {
        ProgramOutcome::Rejected(rejection) => Err(GatewayError::ProgramRejected(rejection)),
        ProgramOutcome::BuildFailed => Ok(Html(BUILD_FAILED).into_response()),
        ProgramOutcome::Ran(output) => Ok(plain_text(output.combined)),
    }
}
