//! Gateway HTTP server: landing page, health check, and the Messenger webhook.

use crate::config::Settings;
use crate::dispatch::{run_processor, Dispatcher};
use crate::error::RelayError;
use crate::gateway::verify::{verify_subscription, VerifyParams};
use crate::messenger::{InboundEnvelope, MessagingEvent, MessengerClient};
use crate::tasks::TaskClient;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

pub const GREETING: &str = "Hi, I am TaskMan! Nice to meet you! <3";
pub const EVENT_RECEIVED: &str = "EVENT_RECEIVED";

const INBOUND_QUEUE: usize = 256;

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct GatewayState {
    /// Port actually bound, reported by the health route.
    pub port: u16,
    /// Expected `hub.verify_token`. None rejects every handshake.
    pub verify_token: Option<Arc<str>>,
    /// Validated events go here; the processor task delivers the replies.
    pub inbound_tx: mpsc::Sender<MessagingEvent>,
}

/// Routes for the gateway.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(landing))
        .route("/health", get(health_http))
        .route("/webhook", get(verify_webhook).post(webhook_event))
        .with_state(state)
}

/// Run the gateway; binds to settings.bind:settings.port and blocks until shutdown
/// (Ctrl+C or SIGTERM). Events already queued when shutdown starts are still delivered.
pub async fn run_gateway(settings: Settings) -> Result<()> {
    if settings.verify_token.is_none() {
        log::warn!(
            "no verify token configured (set messenger.verifyToken or VERIFY_TOKEN); \
             webhook verification will fail"
        );
    }

    let messenger = MessengerClient::new(
        &settings.graph_api_base,
        settings.page_access_token.clone(),
        settings.timeout,
    )?;
    if !messenger.has_token() {
        log::warn!(
            "no page access token configured (set messenger.pageAccessToken or PAGE_ACCESS_TOKEN); \
             replies cannot be sent"
        );
    }
    let tasks = TaskClient::new(&settings.tasks_base_url, settings.timeout)?;
    log::info!("task service at {}", tasks.base_url());
    let dispatcher = Dispatcher::new(Arc::new(tasks), Arc::new(messenger));

    let (inbound_tx, inbound_rx) = mpsc::channel::<MessagingEvent>(INBOUND_QUEUE);
    let processor = tokio::spawn(run_processor(dispatcher, inbound_rx));

    let bind_addr = format!("{}:{}", settings.bind, settings.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding to {}", bind_addr))?;
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(settings.port);

    let state = GatewayState {
        port,
        verify_token: settings.verify_token.as_deref().map(Arc::from),
        inbound_tx,
    };
    let app = router(state);
    log::info!("webhook is listening @ {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("gateway server exited")?;

    // The router (and with it the last inbound sender) is gone; let the processor drain.
    if let Err(e) = processor.await {
        log::warn!("event processor ended abnormally: {}", e);
    }
    log::info!("gateway stopped");
    Ok(())
}

/// Future that completes when the process should shut down (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                log::warn!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    log::info!("shutdown signal received, draining connections");
}

/// GET / — static greeting.
async fn landing() -> &'static str {
    GREETING
}

/// GET /health returns a simple health JSON.
async fn health_http(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(json!({
        "runtime": "running",
        "port": state.port,
    }))
}

/// GET /webhook — subscription handshake.
/// 200 with the challenge, 403 on mismatch, 400 on missing params.
async fn verify_webhook(
    State(state): State<GatewayState>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match verify_subscription(&params, state.verify_token.as_deref()) {
        Ok(challenge) => {
            log::info!("WEBHOOK_VERIFIED");
            (StatusCode::OK, challenge).into_response()
        }
        Err(RelayError::MissingVerificationParams) => {
            log::debug!("verification request without hub.mode or hub.verify_token");
            StatusCode::BAD_REQUEST.into_response()
        }
        Err(e) => {
            log::warn!("webhook verification rejected: {}", e);
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

/// POST /webhook — validates entries, queues them for the processor, and acknowledges at once.
/// Only a body that is not JSON gets 400; anything whose `object` is not "page" gets 404.
/// A bad entry is skipped without affecting its siblings. The ack never waits on delivery:
/// when the queue is full the event is dropped with a warning.
async fn webhook_event(State(state): State<GatewayState>, body: Bytes) -> Response {
    let body: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("rejecting webhook body: {}", e);
            return StatusCode::BAD_REQUEST.into_response();
        }
    };
    let envelope = InboundEnvelope::from_json(body);
    if !envelope.is_page() {
        log::debug!("ignoring webhook for object {:?}", envelope.object);
        return StatusCode::NOT_FOUND.into_response();
    }

    for (index, entry) in envelope.entry.iter().enumerate() {
        log::debug!("webhook entry {}: {}", index, entry);
        match MessagingEvent::from_entry(entry) {
            Ok(Some(event)) => {
                log::info!("Sender PSID: {}", event.sender_id);
                match state.inbound_tx.try_send(event) {
                    Ok(()) => {}
                    Err(TrySendError::Full(event)) => log::warn!(
                        "delivery queue full; dropping entry {} from {}",
                        index,
                        event.sender_id
                    ),
                    Err(TrySendError::Closed(_)) => {
                        log::warn!("event processor is gone; dropping entry {}", index)
                    }
                }
            }
            Ok(None) => log::debug!("entry {} is neither message nor postback", index),
            Err(e) => log::warn!("skipping entry {}: {}", index, e),
        }
    }

    (StatusCode::OK, EVENT_RECEIVED).into_response()
}
