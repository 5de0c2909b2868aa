//! HTTP front ends for the admit services.
//!
//! Two routers share one discovery surface and one error mapping: the
//! execution service accepts a Go upload, the query service a short piece
//! of text. Both sit behind the rotating proof-of-work gate from
//! `admit-core`.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod error;
pub mod routes;
pub mod telemetry;

/// Bind `addr` and serve `app` until the server fails.
///
/// Bind and serve failures are logged and end the process with status 1.
pub async fn serve(addr: &str, app: axum::Router, service: &'static str) {
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(addr = %addr, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(addr = %addr, service, "listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server error");
        std::process::exit(1);
    }
}
