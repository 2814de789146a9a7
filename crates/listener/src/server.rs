//! HTTP webhook receiver.
//!
//! Provides:
//! - `POST /` - GitHub webhook endpoint
//! - `GET /health` - liveness and supervisor readiness
//!
//! `POST /` answers `400` when the signature does not verify, `503` when the
//! supervisor is not connected yet, and `204` otherwise. The `204` is sent
//! before the delivery is processed; its outcome only shows up in the logs.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use github::{WebhookSecret, SIGNATURE_HEADER};
use pipeline::DeliveryId;
use serde_json::json;
use tracing::{info, warn};

use crate::readiness::ReadinessGate;
use crate::task::spawn_delivery;

/// Header GitHub uses to identify a delivery.
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// GitHub caps webhook payloads at 25 MB.
pub const MAX_PAYLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct WebhookState {
    /// Shared secret deliveries are signed with.
    pub secret: WebhookSecret,
    /// Opens once the supervisor handshake succeeded.
    pub gate: ReadinessGate,
    /// Daemon version, reported by `/health`.
    pub version: &'static str,
}

/// Create the HTTP router for the webhook endpoint.
pub fn create_router(state: WebhookState) -> Router {
    Router::new()
        .route("/", post(webhook_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(MAX_PAYLOAD_BYTES))
        .with_state(Arc::new(state))
}

/// Handler for `POST /`.
async fn webhook_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = github::verify(&state.secret, &body, signature) {
        warn!(error = %e, "Rejected webhook delivery");
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Invalid signature" })),
        )
            .into_response();
    }

    let Some(handler) = state.gate.handler() else {
        warn!("Process supervisor not connected yet, rejecting delivery");
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };

    let delivery = delivery_id(&headers);
    info!(delivery_id = %delivery, bytes = body.len(), "Accepted webhook delivery");
    // Detached: the sender must not wait for, or observe, the deployment.
    drop(spawn_delivery(handler, delivery, body));

    StatusCode::NO_CONTENT.into_response()
}

/// Uses GitHub's delivery GUID when present so log lines can be matched with
/// the repository's webhook delivery history.
fn delivery_id(headers: &HeaderMap) -> DeliveryId {
    headers
        .get(DELIVERY_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| uuid::Uuid::parse_str(v).ok())
        .map(DeliveryId::from_uuid)
        .unwrap_or_else(DeliveryId::new_random)
}

/// Handler for `GET /health`.
async fn health_handler(State(state): State<Arc<WebhookState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "ready": state.gate.is_ready(),
        "version": state.version,
    }))
}

/// Bind `addr` and serve `router` until `shutdown` resolves.
pub async fn serve(
    addr: SocketAddr,
    router: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}
