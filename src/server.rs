// HTTP server for scan requests
//
// Routes:
// - POST /scanner/{tool}  run one scan
// - GET  /tools           list tool profiles
// - GET  /health          liveness
// - GET  /metrics         Prometheus text format (when enabled)

use crate::config::Config;
use crate::gateway::{ExecutionStatus, Gateway, GatewayError, ProfileSummary};
use crate::metrics;
use crate::notify::{spawn_notify, Notifier, ScanNotification, SlackNotifier};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub permits: Arc<Semaphore>,
    pub notifier: Option<Arc<dyn Notifier>>,
}

impl AppState {
    pub fn new(gateway: Gateway, max_concurrent_scans: usize) -> Self {
        Self {
            gateway: Arc::new(gateway),
            permits: Arc::new(Semaphore::new(max_concurrent_scans)),
            notifier: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }
}

/// Body of `POST /scanner/{tool}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    pub target: String,
    #[serde(default)]
    pub options: Option<String>,
}

#[derive(Debug)]
enum ApiError {
    BadRequest { kind: &'static str, message: String },
    NotFound(String),
    Busy,
    InternalError { kind: &'static str, message: String },
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        let kind = err.kind();
        match err {
            GatewayError::ValidationRejected(_) => ApiError::BadRequest {
                kind,
                message: err.to_string(),
            },
            GatewayError::UnknownTool(_) => ApiError::NotFound(err.to_string()),
            GatewayError::Scratch(_) => {
                error!("Scan aborted: {}", err);
                ApiError::InternalError {
                    kind,
                    message: err.to_string(),
                }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest { kind, message } => (StatusCode::BAD_REQUEST, kind, message),
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "unknown_tool", message),
            ApiError::Busy => (
                StatusCode::TOO_MANY_REQUESTS,
                "busy",
                "too many scans in progress".to_string(),
            ),
            ApiError::InternalError { kind, message } => (StatusCode::INTERNAL_SERVER_ERROR, kind, message),
        };

        let body = Json(serde_json::json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

/// HTTP status for a completed scan
fn status_code(status: ExecutionStatus) -> StatusCode {
    match status {
        ExecutionStatus::Success => StatusCode::OK,
        ExecutionStatus::ToolFailure => StatusCode::BAD_GATEWAY,
        ExecutionStatus::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ExecutionStatus::LaunchFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Build the application router
pub fn router(state: AppState, metrics_enabled: bool) -> Router {
    let mut app = Router::new()
        .route("/scanner/{tool}", post(scan_handler))
        .route("/tools", get(tools_handler))
        .route("/health", get(health_handler));

    if metrics_enabled {
        app = app.route("/metrics", get(metrics_handler));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}

/// Start the HTTP server
///
/// Runs until the listener fails or the process is stopped.
pub async fn start_server(config: &Config) -> Result<()> {
    metrics::init().context("Failed to initialize metrics")?;

    let registry = config.profile_registry()?;
    let gateway = Gateway::new(registry, config.gateway_config());
    let mut state = AppState::new(gateway, config.server.max_concurrent_scans);

    if let Some(url) = &config.notify.slack_webhook_url {
        info!("Slack notifications enabled");
        state = state.with_notifier(Arc::new(SlackNotifier::new(url.clone())));
    }

    let app = router(state, config.server.metrics_enabled);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.bind, config.server.port))?;

    info!("Starting recon gateway on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind server")?;

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

/// Scan endpoint handler
///
/// The permit and the in-flight invocation live in this future, so a client
/// disconnect releases the permit and kills the tool.
async fn scan_handler(
    State(state): State<AppState>,
    Path(tool): Path<String>,
    Json(request): Json<ScanRequest>,
) -> Result<Response, ApiError> {
    if !state.gateway.registry().contains(&tool) {
        return Err(ApiError::NotFound(format!("unknown tool '{}'", tool)));
    }

    let _permit = state.permits.clone().try_acquire_owned().map_err(|_| {
        warn!("Rejecting {} scan: all scan slots busy", tool);
        ApiError::Busy
    })?;

    let outcome = state
        .gateway
        .execute(&tool, &request.target, request.options.as_deref())
        .await?;

    if let Some(notifier) = &state.notifier {
        spawn_notify(notifier.clone(), ScanNotification::from_outcome(&outcome));
    }

    Ok((status_code(outcome.result.status), Json(outcome)).into_response())
}

/// Tool listing handler
async fn tools_handler(State(state): State<AppState>) -> Json<Vec<ProfileSummary>> {
    Json(state.gateway.registry().summaries())
}

/// Health check endpoint
async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Metrics endpoint handler
async fn metrics_handler() -> Response {
    match metrics::gather_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text).into_response(),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error gathering metrics: {}", e),
            )
                .into_response()
        }
    }
}
