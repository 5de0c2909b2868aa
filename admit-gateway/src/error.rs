//! Error types for the gateway crate.

use admit_sandbox::{Rejection as ProgramRejection, SandboxError};
use admit_query::Rejection as QueryRejection;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};

/// Which front end raised the error. The two services word their replies
/// differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Exec,
    Query,
}

/// Errors that end a request before a result is produced.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum GatewayError {
    /// The `pow` token does not match the current secret.
    #[error("wrong pow")]
    WrongPow(Surface),

    /// The request body exceeds the service ceiling.
    #[error("payload too large")]
    PayloadTooLarge(Surface),

    /// The upload form carried no `file` field.
    #[error("need a Go file to run")]
    MissingProgram,

    /// The static program filter refused the upload.
    #[error("program rejected: {0}")]
    ProgramRejected(ProgramRejection),

    /// The query filter refused the text.
    #[error("query rejected: {0}")]
    QueryRejected(QueryRejection),

    /// Scratch file or process failure in the sandbox.
    #[error("sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    /// The request body could not be decoded.
    #[error("invalid request: {1}")]
    InvalidRequest(Surface, String),
}

const UPLOAD_TOO_LARGE: &str = "Error while uploading: <b> file is too large (>10KB) </b>";
const NOT_ALLOWED: &str = "Error: <b> Not allowed </b>";

impl GatewayError {
    fn status_and_body(&self) -> (StatusCode, String) {
        match self {
            Self::WrongPow(Surface::Exec) => {
                (StatusCode::FORBIDDEN, "Error while uploading: <b> wrong pow </b>".to_owned())
            }
            Self::WrongPow(Surface::Query) => {
                (StatusCode::FORBIDDEN, "Error: <b> Wrong pow </b>".to_owned())
            }
            Self::PayloadTooLarge(Surface::Exec)
            | Self::ProgramRejected(ProgramRejection::TooLarge) => {
                (StatusCode::PAYLOAD_TOO_LARGE, UPLOAD_TOO_LARGE.to_owned())
            }
            Self::PayloadTooLarge(Surface::Query) => {
                (StatusCode::PAYLOAD_TOO_LARGE, NOT_ALLOWED.to_owned())
            }
            Self::MissingProgram => (
                StatusCode::FORBIDDEN,
                "Error while uploading: <b> need a Go file to run</b>".to_owned(),
            ),
            Self::ProgramRejected(rejection) => {
                (StatusCode::FORBIDDEN, format!("Error: {rejection}"))
            }
            Self::QueryRejected(_) => (StatusCode::FORBIDDEN, NOT_ALLOWED.to_owned()),
            Self::Sandbox(SandboxError::ScratchCreate { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error while uploading: <b> failed to create temporary file</b>".to_owned(),
            ),
            Self::Sandbox(SandboxError::ScratchWrite { .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error while uploading: <b> failed to write temporary file</b>".to_owned(),
            ),
            Self::Sandbox(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error while running: <b> sandbox unavailable </b>".to_owned(),
            ),
            Self::InvalidRequest(..) => {
                (StatusCode::BAD_REQUEST, "Error: <b> malformed request </b>".to_owned())
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_body();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Html(body)).into_response()
    }
}
