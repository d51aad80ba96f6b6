//! The enclave-side HTTP surface (spec §6): `GET /attestation`, `POST /prove`.
//!
//! Grounded on the teacher's middleware stack (load shedding, backpressure
//! buffering, concurrency limiting, per-request timeout) but simplified to
//! a single crate's worth of dependencies: `axum::serve` over a plain tokio
//! `TcpListener` instead of `axum_server`/rustls (the enclave's loopback
//! address never needs TLS — the untrusted host terminates the outer
//! connection; see the bridge), and [`teerex_core::shutdown::ShutdownChannel`]
//! instead of `axum_server::Handle`'s graceful-shutdown API.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{DefaultBodyLimit, Json, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use teerex_core::{ErrorResponse, Nonce, VaultKeypair};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::ProveError;

const HANDLING_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const BUFFER_SIZE: usize = 64;
const CONCURRENCY_LIMIT: usize = 16;

pub struct AppState {
    pub vault: VaultKeypair,
    pub config: Config,
}

#[derive(Deserialize)]
struct AttestationQuery {
    nonce: Option<String>,
}

#[derive(Serialize)]
struct ProveResponse {
    proof: String,
}

#[derive(Deserialize)]
struct ProveRequest {
    data: String,
}

pub fn router(state: Arc<AppState>) -> Router {
    let inner = Router::new()
        .route("/attestation", get(get_attestation))
        .route("/prove", post(post_prove))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(axum::error_handling::HandleErrorLayer::new(handle_capacity_error))
                .load_shed()
                .buffer(BUFFER_SIZE)
                .concurrency_limit(CONCURRENCY_LIMIT)
                .layer(axum::error_handling::HandleErrorLayer::new(handle_timeout_error))
                .timeout(HANDLING_TIMEOUT),
        )
        .with_state(state);

    Router::new()
        .merge(inner)
        .layer(TraceLayer::new_for_http())
}

async fn get_attestation(
    State(state): State<Arc<AppState>>,
    axum::extract::Query(query): axum::extract::Query<AttestationQuery>,
) -> impl IntoResponse {
    let nonce = query
        .nonce
        .map(|n| base64::engine::general_purpose::STANDARD.decode(n))
        .transpose();
    let nonce = match nonce {
        Ok(n) => n.map(Nonce),
        Err(_) => return error_response(ProveError::InvalidEnvelope),
    };

    match crate::attest::attest(state.config.mode, state.vault.public_key(), nonce.as_ref()) {
        Ok(artifact) => (http::StatusCode::OK, axum::Json(artifact)).into_response(),
        Err(e) => error_response(e),
    }
}

async fn post_prove(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProveRequest>,
) -> impl IntoResponse {
    let envelope = match base64::engine::general_purpose::STANDARD.decode(&req.data) {
        Ok(bytes) => bytes,
        Err(_) => return error_response(ProveError::InvalidEnvelope),
    };

    match crate::prove::prove(&envelope, &state.vault, &state.config).await {
        Ok(proof) => (
            http::StatusCode::OK,
            axum::Json(ProveResponse {
                proof: base64::engine::general_purpose::STANDARD.encode(proof),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

async fn handle_capacity_error(error: tower::BoxError) -> impl IntoResponse {
    tracing::warn!(%error, "service at capacity");
    let body = ErrorResponse::new(
        teerex_core::ErrorCode::RateLimited,
        format!("service at capacity: {error}"),
    );
    (http::StatusCode::TOO_MANY_REQUESTS, axum::Json(body))
}

async fn handle_timeout_error(error: tower::BoxError) -> impl IntoResponse {
    tracing::warn!(%error, "request timed out");
    let body = ErrorResponse::new(
        teerex_core::ErrorCode::Unavailable,
        format!("request timed out: {error}"),
    );
    (http::StatusCode::SERVICE_UNAVAILABLE, axum::Json(body))
}

fn error_response(err: ProveError) -> axum::response::Response {
    let code = err.code();
    tracing::warn!(error = %err, code = ?code, "request failed");
    let body = ErrorResponse::new(code, err.to_string());
    let status = http::StatusCode::from_u16(code.http_status())
        .unwrap_or(http::StatusCode::INTERNAL_SERVER_ERROR);
    (status, axum::Json(body)).into_response()
}

/// Bind `bind_addr` and start listening (spec §4.8 steps 1-2: assign the
/// loopback address, then wait for readiness). Split out from [`serve`] so
/// callers can observe the socket is actually listening before announcing
/// readiness to anything else.
pub async fn bind(bind_addr: SocketAddr) -> anyhow::Result<tokio::net::TcpListener> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(%bind_addr, "prove service listening");
    Ok(listener)
}

/// Serve `router` on `bind_addr` until `shutdown` fires, waiting up to
/// `drain_deadline` for in-flight requests to finish (spec §4.8).
pub async fn serve(
    bind_addr: SocketAddr,
    router: Router,
    shutdown: teerex_core::shutdown::ShutdownChannel,
    drain_deadline: Duration,
) -> anyhow::Result<()> {
    let listener = bind(bind_addr).await?;
    serve_on(listener, router, shutdown, drain_deadline).await
}

/// Serve `router` on an already-bound `listener` until `shutdown` fires,
/// waiting up to `drain_deadline` for in-flight requests to finish.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    router: Router,
    shutdown: teerex_core::shutdown::ShutdownChannel,
    drain_deadline: Duration,
) -> anyhow::Result<()> {
    let serve_fut = axum::serve(listener, router.into_make_service());
    let graceful = serve_fut.with_graceful_shutdown(async move {
        shutdown.recv().await;
        tracing::info!("prove service shutting down");
    });

    match tokio::time::timeout(drain_deadline, graceful).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            tracing::warn!("prove service timed out draining in-flight requests");
            Ok(())
        }
    }
}
