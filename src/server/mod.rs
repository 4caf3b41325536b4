//! HTTP API for on-demand accessibility checks
//!
//! Architecture: Interface Layer - translates HTTP requests into page requests
//! - Every failure becomes a JSON body with a stable `error` label and a `message`
//! - A response carries either a report or an error, never both
//! - The analyzer is shared, immutable state; requests never touch each other

use crate::analyzer::{parse_target, PageAnalyzer, PageRequest};
use crate::domain::issues::A11yError;
use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

/// Application state shared across routes.
#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<dyn PageAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: Arc<dyn PageAnalyzer>) -> Self {
        Self { analyzer }
    }
}

/// JSON body accepted by `POST /api/check`
#[derive(Debug, Deserialize)]
struct CheckRequest {
    url: String,
    #[serde(default)]
    rules: Vec<String>,
}

/// An error response body
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: &'static str,
    message: Option<String>,
}

impl ApiError {
    fn missing_url() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Invalid request",
            message: Some("URL is required".to_string()),
        }
    }

    fn method_not_allowed() -> Self {
        Self {
            status: StatusCode::METHOD_NOT_ALLOWED,
            error: "Method not allowed",
            message: None,
        }
    }

    fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: "Not found",
            message: None,
        }
    }
}

impl From<A11yError> for ApiError {
    fn from(err: A11yError) -> Self {
        let message = match &err {
            A11yError::Input { message } => message.clone(),
            other => other.to_string(),
        };

        if err.is_client_error() {
            Self {
                status: StatusCode::BAD_REQUEST,
                error: "Invalid request",
                message: Some(message),
            }
        } else {
            Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                error: "Failed to check accessibility",
                message: Some(message),
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.message {
            Some(message) => json!({ "error": self.error, "message": message }),
            None => json!({ "error": self.error }),
        };
        (self.status, Json(body)).into_response()
    }
}

/// CORS policy: any origin, the check and health methods, and the usual client headers
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS, Method::POST])
        .allow_headers([
            HeaderName::from_static("x-csrf-token"),
            HeaderName::from_static("x-requested-with"),
            header::ACCEPT,
            HeaderName::from_static("accept-version"),
            header::CONTENT_LENGTH,
            HeaderName::from_static("content-md5"),
            header::CONTENT_TYPE,
            header::DATE,
            HeaderName::from_static("x-api-version"),
            header::AUTHORIZATION,
        ])
}

/// Build the Axum router with all API routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/check",
            post(check)
                .options(|| async { StatusCode::OK })
                .fallback(|| async { ApiError::method_not_allowed() }),
        )
        .route("/api/health", get(health))
        .fallback(|| async { ApiError::not_found() })
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Starts the HTTP server and runs until Ctrl-C.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("A11y Guardian listening on {}", listener.local_addr()?);

    serve(listener, state, shutdown_signal()).await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "a11y-guardian",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Check one page and return its report.
async fn check(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let value: Value = serde_json::from_slice(&body).map_err(|_| ApiError::missing_url())?;

    let has_url = value
        .get("url")
        .and_then(Value::as_str)
        .is_some_and(|url| !url.trim().is_empty());
    if !has_url {
        return Err(ApiError::missing_url());
    }

    let request: CheckRequest = serde_json::from_value(value)
        .map_err(|e| A11yError::input(format!("Invalid request body: {e}")))?;

    let url = parse_target(&request.url, false)?;
    let page_request = PageRequest::new(url).with_rules(request.rules);

    match state.analyzer.analyze(&page_request).await {
        Ok(page) => {
            info!(
                url = %page.page_url,
                runner = %page.test_runner,
                issues = page.summary().total,
                "Check completed"
            );
            Ok(Json(page).into_response())
        }
        Err(err) => {
            warn!(url = %page_request.url, error = %err, "Check failed");
            Err(err.into())
        }
    }
}
