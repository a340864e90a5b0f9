//! HTTP ingest endpoints plus health, readiness and metrics.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use brx_middleware::latency::{elapsed_secs, now_tsc};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::metrics::ReceiverMetrics;
use crate::parser::{ErrorLogProducer, PerfDataProducer};

/// Reply to every ingest call. Browsers expect an (empty) command set.
#[derive(Serialize, Default)]
pub struct Commands {}

#[derive(Clone)]
pub struct ServerState {
    pub perf_data: Arc<PerfDataProducer>,
    pub error_log: Arc<ErrorLogProducer>,
    pub metrics: ReceiverMetrics,
    pub ready: Arc<AtomicBool>,
}

impl ServerState {
    pub fn new(
        perf_data: Arc<PerfDataProducer>,
        error_log: Arc<ErrorLogProducer>,
        metrics: ReceiverMetrics,
    ) -> Self {
        Self {
            perf_data,
            error_log,
            metrics,
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

async fn perf_data(State(state): State<ServerState>, body: Bytes) -> Json<Commands> {
    let start = now_tsc();
    state.perf_data.send_bytes(&body);
    state
        .perf_data
        .metrics()
        .observe_ingest_latency(elapsed_secs(start));
    Json(Commands::default())
}

async fn error_logs(State(state): State<ServerState>, body: Bytes) -> Json<Commands> {
    let start = now_tsc();
    state.error_log.send_batch_bytes(&body);
    state
        .error_log
        .metrics()
        .observe_ingest_latency(elapsed_secs(start));
    Json(Commands::default())
}

async fn error_log(State(state): State<ServerState>, body: Bytes) -> Json<Commands> {
    let start = now_tsc();
    state.error_log.send_bytes(&body);
    state
        .error_log
        .metrics()
        .observe_ingest_latency(elapsed_secs(start));
    Json(Commands::default())
}

async fn health() -> &'static str {
    "ok"
}

async fn ready(State(state): State<ServerState>) -> (StatusCode, &'static str) {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, "ready")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "not_ready")
    }
}

async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(header::CONTENT_TYPE, "text/plain")],
                e.to_string(),
            )
        }
    }
}

pub fn create_router(state: ServerState) -> Router {
    Router::new()
        .route("/browser/perfData", post(perf_data))
        .route("/browser/errorLogs", post(error_logs))
        .route("/browser/errorLog", post(error_log))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `cancel` fires
pub async fn run_server(
    addr: SocketAddr,
    state: ServerState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Ingest server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
