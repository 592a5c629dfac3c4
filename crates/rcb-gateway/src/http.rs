//! HTTP ingress/egress gateway.
//!
//! Three routes: the webhook intake that feeds the inbound topic, the SSE
//! push channel that drains the outbound topic, and a health endpoint.
//! Everything else falls through to a JSON 404. The gateway never touches
//! the RCON transport itself; it only reads the client's state for health
//! reporting.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, Method, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::{EventBus, SubscriptionToken, TOPIC_INBOUND, TOPIC_OUTBOUND};
use crate::rcon::RconClient;

/// Request body allowance for the webhook route (20 MiB).
const BODY_LIMIT: usize = 20 * 1024 * 1024;

/// Shared state injected into every handler.
pub struct AppState {
    pub bus: EventBus,
    pub rcon: Arc<RconClient>,
    pub started_at: DateTime<Utc>,
}

/// Uniform JSON response envelope.
#[derive(Debug, Serialize)]
struct ApiResponse {
    data: Value,
    message: String,
    success: bool,
}

impl ApiResponse {
    fn ok(data: Value) -> Json<Self> {
        Json(Self {
            data,
            message: "OK".to_string(),
            success: true,
        })
    }

    fn err(message: &str) -> Json<Self> {
        Json(Self {
            data: Value::Null,
            message: message.to_string(),
            success: false,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(health))
        .route("/events", post(ingest_event))
        .route("/sse", get(sse_stream))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(state: Arc<AppState>, host: &str, port: u16) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))?;
    let router = build_router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind failed on {addr}"))?;
    info!(%addr, "http gateway listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse> {
    ApiResponse::ok(json!({
        "rcon_state": state.rcon.state().to_string(),
        "rcon_connected_at": state.rcon.connected_at(),
        "started_at": state.started_at,
    }))
}

/// Webhook intake: any JSON body is re-serialized and published verbatim
/// to the inbound topic. Whether anything recognizes it is the
/// dispatcher's business.
async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(body): Json<Value>,
) -> Json<ApiResponse> {
    let payload = body.to_string();
    debug!(bytes = payload.len(), "webhook event received");
    state.bus.publish(TOPIC_INBOUND, &payload);
    ApiResponse::ok(Value::Null)
}

async fn not_found() -> (StatusCode, Json<ApiResponse>) {
    (StatusCode::NOT_FOUND, ApiResponse::err("Not Found"))
}

/// Detaches the push subscription when the observer goes away.
struct OutboundSubscription {
    bus: EventBus,
    token: SubscriptionToken,
    client_id: String,
}

impl Drop for OutboundSubscription {
    fn drop(&mut self) {
        info!(client = %self.client_id, "sse client disconnected");
        self.bus.unsubscribe(self.token);
    }
}

fn event_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Long-lived push channel. The connecting observer replaces any previous
/// subscriber of the outbound topic, so exactly one observer consumes
/// command outcomes even when an earlier connection was never torn down
/// cleanly.
async fn sse_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let client_id = event_id();
    info!(client = %client_id, "sse client connected");

    let (tx, rx) = mpsc::unbounded_channel::<String>();

    // Greet the observer before any outcome arrives.
    let _ = tx.send(json!({"code": 200, "msg": "OK"}).to_string());

    let forward = tx.clone();
    let token = state.bus.subscribe_replacing(
        TOPIC_OUTBOUND,
        Arc::new(move |payload: &str| {
            forward
                .send(payload.to_string())
                .map_err(|_| anyhow::anyhow!("push channel closed"))
        }),
    );

    let guard = OutboundSubscription {
        bus: state.bus.clone(),
        token,
        client_id,
    };
    let stream = UnboundedReceiverStream::new(rx).map(move |data| {
        // The guard lives as long as the stream does.
        let _ = &guard;
        Ok::<Event, Infallible>(Event::default().id(event_id()).event("bridge_data").data(data))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
