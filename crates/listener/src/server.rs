//! The webhook HTTP endpoint.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use pipeline::{DeliveryId, PullRequestHandler, SecretString};
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::{verify_signature, PullRequestPayload, SIGNATURE_HEADER};

/// Address the listener binds unless configured otherwise.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3016";

/// Route that accepts deliveries unless configured otherwise.
pub const DEFAULT_WEBHOOK_PATH: &str = "/webhooks";

const EVENT_HEADER: &str = "X-GitHub-Event";
const DELIVERY_HEADER: &str = "X-GitHub-Delivery";

/// Webhook endpoint settings.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Route path, starting with `/`.
    pub path: String,
    /// HMAC key shared with GitHub.
    pub secret: SecretString,
}

#[derive(Clone)]
struct WebhookState {
    secret: SecretString,
    handler: Arc<dyn PullRequestHandler>,
}

/// Builds the router: `POST <config.path>` and nothing else.
pub fn router(config: WebhookConfig, handler: Arc<dyn PullRequestHandler>) -> Router {
    let state = WebhookState {
        secret: config.secret,
        handler,
    };
    Router::new()
        .route(&config.path, post(receive))
        .with_state(state)
}

/// Serves `router` on `listener` until `shutdown` resolves.
///
/// In-flight requests finish before this returns; dispatches already handed
/// to their own tasks are not awaited.
///
/// # Errors
///
/// Returns the I/O error that stopped the server.
pub async fn serve<F>(listener: TcpListener, router: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Listening for webhook deliveries");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

fn reject(status: StatusCode, message: impl std::fmt::Display) -> Response {
    warn!(status = status.as_u16(), "Rejected delivery: {message}");
    (status, message.to_string()).into_response()
}

async fn receive(State(state): State<WebhookState>, headers: HeaderMap, body: Bytes) -> Response {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if let Err(e) = verify_signature(&state.secret, header(SIGNATURE_HEADER), &body) {
        return reject(StatusCode::UNAUTHORIZED, e);
    }
    let Some(event_type) = header(EVENT_HEADER) else {
        return reject(StatusCode::BAD_REQUEST, "X-GitHub-Event header missing");
    };
    let delivery_id = header(DELIVERY_HEADER).and_then(DeliveryId::new);

    match event_type {
        "ping" => (StatusCode::OK, "pong").into_response(),
        "pull_request" => {
            let payload: PullRequestPayload = match serde_json::from_slice(&body) {
                Ok(payload) => payload,
                Err(e) => {
                    return reject(StatusCode::BAD_REQUEST, format!("error parsing body: {e}"))
                }
            };
            let event = match payload.into_event(delivery_id) {
                Ok(event) => event,
                Err(e) => return reject(StatusCode::BAD_REQUEST, e),
            };

            info!(
                delivery_id = event.delivery_id.as_ref().map(|d| d.as_str()),
                pr_number = %event.number,
                repository = %event.head.repository.full_name,
                action = %event.action,
                "Accepted pull_request delivery"
            );
            let handler = Arc::clone(&state.handler);
            tokio::spawn(async move { handler.handle(event).await });

            StatusCode::OK.into_response()
        }
        other => reject(StatusCode::BAD_REQUEST, format!("unsupported event: {other}")),
    }
}
