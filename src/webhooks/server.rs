//! Webhook server implementation
//!
//! Provides HTTP endpoints for receiving OpsLevel webhook deliveries.
//! Every delivery is checked against the configured signing secret before
//! it is accepted.

use std::future::Future;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;

use super::config::{WebhookConfig, WebhookConfigError};
use crate::signature::{
    signature_from_headers, HeaderSet, SignatureError, SignatureVerifier, HEADER_SIGNATURE,
    HEADER_TIMING,
};

/// Name reported by the health endpoint
pub const SERVICE_NAME: &str = "opslevel-webhooks";

/// Shared application state for the webhook server
#[derive(Debug, Clone)]
pub struct AppState {
    /// Webhook configuration
    pub config: Arc<WebhookConfig>,
    /// Verifier built from the configured secret
    pub verifier: Arc<SignatureVerifier>,
    /// Indicates if the server is healthy
    pub healthy: Arc<RwLock<bool>>,
}

impl AppState {
    /// Create a new AppState with the given config.
    ///
    /// Fails when the configuration carries no signing secret.
    pub fn new(config: WebhookConfig) -> Result<Self, WebhookConfigError> {
        let verifier = config.verifier()?;
        Ok(Self {
            config: Arc::new(config),
            verifier: Arc::new(verifier),
            healthy: Arc::new(RwLock::new(true)),
        })
    }

    /// Set the health status
    pub async fn set_healthy(&self, healthy: bool) {
        let mut guard = self.healthy.write().await;
        *guard = healthy;
    }

    /// Check if the server is healthy
    pub async fn is_healthy(&self) -> bool {
        *self.healthy.read().await
    }
}

/// Webhook error types
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    /// The delivery lacks a header needed to verify it
    #[error(transparent)]
    Unverifiable(#[from] SignatureError),
    /// The claimed signature does not match the computed one
    #[error("webhook signature does not match")]
    SignatureMismatch,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Unverifiable(_) => StatusCode::BAD_REQUEST,
            WebhookError::SignatureMismatch => StatusCode::FORBIDDEN,
        };

        let body = Json(WebhookErrorResponse {
            error: self.to_string(),
        });

        (status, body).into_response()
    }
}

/// Result type for webhook operations
pub type WebhookResult<T> = Result<T, WebhookError>;

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookErrorResponse {
    pub error: String,
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

/// OpsLevel webhook response
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub verified: bool,
    pub computed_signature: String,
    pub message: String,
}

/// Create the webhook router with all routes
pub fn create_webhook_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/webhook", post(opslevel_webhook_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint handler
///
/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.is_healthy().await {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// OpsLevel webhook endpoint handler
///
/// POST /webhook
///
/// Verifies the `X-OpsLevel-Signature` of the delivery against the raw body.
/// Returns 400 when a required header is missing and 403 when the signature
/// does not match, unless the server runs in report-only mode.
pub async fn opslevel_webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> WebhookResult<Json<WebhookResponse>> {
    let claimed = signature_from_headers(&headers).map_err(unverifiable)?;
    let content = state
        .verifier
        .content(&headers, &body)
        .map_err(unverifiable)?;
    let verification = state.verifier.verify_content(&content, &claimed);

    tracing::info!(
        matched = verification.matched,
        received = %claimed,
        computed = %verification.computed_signature,
        "Received OpsLevel webhook"
    );
    tracing::debug!(content = %content, "Signed content");

    if verification.matched {
        return Ok(Json(WebhookResponse {
            verified: true,
            computed_signature: verification.computed_signature,
            message: "Signature match".to_string(),
        }));
    }

    if state.config.report_only {
        tracing::warn!("Signature does not match; accepting delivery in report-only mode");
        return Ok(Json(WebhookResponse {
            verified: false,
            computed_signature: verification.computed_signature,
            message: "Signature does not match".to_string(),
        }));
    }

    Err(WebhookError::SignatureMismatch)
}

fn unverifiable(err: SignatureError) -> WebhookError {
    tracing::warn!(error = %err, "Rejected unverifiable webhook");
    WebhookError::Unverifiable(err)
}

/// Build a `curl` command that sends a correctly signed test delivery to
/// this server.
pub fn curl_example(state: &AppState) -> Result<String, SignatureError> {
    const TIMING: &str = "123456";

    let headers = HeaderSet::new().with(HEADER_TIMING, TIMING);
    let signature = state.verifier.sign(&headers, b"")?;

    Ok(format!(
        "curl -X POST -H '{}: {}' -H '{}: {}' http://{}/webhook",
        HEADER_TIMING,
        TIMING,
        HEADER_SIGNATURE,
        signature,
        state.config.socket_addr()
    ))
}

/// Serve the webhook router on an already-bound listener until `shutdown`
/// resolves.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    state: AppState,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_webhook_router(state.clone());
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;
    state.set_healthy(false).await;
    result
}

/// Bind the configured address and serve until Ctrl-C.
pub async fn run_server(state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(state.config.socket_addr()).await?;
    tracing::info!(
        address = %listener.local_addr()?,
        report_only = state.config.report_only,
        additional_headers = ?state.config.additional_headers,
        "Webhook server listening"
    );

    serve_with_shutdown(listener, state, async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutting down webhook server");
    })
    .await
}
