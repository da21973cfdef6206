//! Axum HTTP server: control endpoints, proxy fallback, graceful shutdown.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use reqwest::Url;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::error::SwitchError;
use crate::intercept::InterceptionTransport;
use crate::mode::Mode;
use crate::proxy::frontend;
use crate::stats::ProxyStats;

/// Inbound bodies are buffered up to this size.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub listen_address: String,
    pub target_url: Url,
    pub interceptor: Arc<InterceptionTransport>,
    pub stats: ProxyStats,
}

/// Body of `/gmeter/record` and `/gmeter/play`.
#[derive(Debug, Deserialize, PartialEq)]
struct SwitchRequest {
    #[serde(default)]
    cassette: String,
}

#[derive(Debug, Clone, Copy)]
enum SwitchTarget {
    Record,
    Play,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/gmeter/record", post(handle_record))
        .route("/gmeter/play", post(handle_play))
        .route("/gmeter/mode", get(handle_get_mode))
        .route("/gmeter/stats", get(handle_get_stats))
        .route("/gmeter/health", get(handle_health))
        .fallback(handle_proxy)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Build and run the HTTP server.
pub async fn run(state: AppState) -> anyhow::Result<()> {
    let listen_addr = state.listen_address.clone();
    let target = state.target_url.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    tracing::info!(address = %listen_addr, upstream = %target, "Started proxy");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("gmeter shut down gracefully");
    Ok(())
}

fn decode_switch_request(body: &[u8]) -> Result<SwitchRequest, SwitchError> {
    serde_json::from_slice(body)
        .map_err(|e| SwitchError::BadSwitchRequest(format!("failed to decode request: {e}")))
}

async fn switch(state: &AppState, target: SwitchTarget, body: &[u8]) -> Response {
    let result = match decode_switch_request(body) {
        Ok(request) => match target {
            SwitchTarget::Record => state.interceptor.switch_to_recording(&request.cassette).await,
            SwitchTarget::Play => state.interceptor.switch_to_playing(&request.cassette).await,
        },
        Err(e) => Err(e),
    };

    match result {
        Ok(mode) => axum::Json(mode).into_response(),
        Err(e) => {
            let status = match &e {
                SwitchError::BadSwitchRequest(_) => StatusCode::BAD_REQUEST,
                SwitchError::Cassette(_) | SwitchError::Client(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            tracing::warn!(action = ?target, error = %e, "Switch failed");
            (
                status,
                axum::Json(serde_json::json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

/// POST /gmeter/record: start recording the named cassette.
async fn handle_record(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    switch(&state, SwitchTarget::Record, &body).await
}

/// POST /gmeter/play: start playing the named cassette.
async fn handle_play(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    switch(&state, SwitchTarget::Play, &body).await
}

/// GET /gmeter/mode: current mode and cassette.
async fn handle_get_mode(State(state): State<Arc<AppState>>) -> axum::Json<Mode> {
    axum::Json(state.interceptor.mode().await)
}

/// GET /gmeter/stats: dispatch counters.
async fn handle_get_stats(State(state): State<Arc<AppState>>) -> Response {
    axum::Json(state.stats.snapshot()).into_response()
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Catch-all: proxy the request to the target through the interceptor.
async fn handle_proxy(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "Failed to read request body");
            return (StatusCode::BAD_REQUEST, "failed to read request body").into_response();
        }
    };

    let outbound = match frontend::rewrite_request(&state.target_url, http::Request::from_parts(parts, body)) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to rewrite request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    match state.interceptor.dispatch(outbound).await {
        Ok(response) => frontend::relay_response(response),
        Err(e) => frontend::error_response(&e),
    }
}

/// Wait for SIGINT (Ctrl+C) for graceful shutdown.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install CTRL+C signal handler");
    tracing::info!("Shutdown signal received, draining connections...");
}
