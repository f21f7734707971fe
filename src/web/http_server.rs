//! HTTP server for health checks, relay status and metrics

use crate::web::shared::SharedState;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use log::{error, info};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Build the status router
pub fn router(state: Arc<SharedState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the HTTP status server
pub async fn run_http_server(
    host: &str,
    port: u16,
    state: Arc<SharedState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    info!("HTTP status server listening on http://{}", addr);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Health check handler
async fn health_handler(State(state): State<Arc<SharedState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "uptime_seconds": state.uptime().as_secs_f64(),
        "connections": state.connection_count(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Mailbox status handler
async fn status_handler(State(state): State<Arc<SharedState>>) -> Json<Value> {
    let snapshot = state.registry.snapshot();
    Json(json!({
        "camera_connected": snapshot.camera_connected,
        "viewer_connected": snapshot.viewer_connected,
        "offer_cached": snapshot.offer_cached,
        "cached_candidates": snapshot.cached_candidates,
        "camera_id": snapshot.camera_id,
        "viewer_id": snapshot.viewer_id,
    }))
}

/// Metrics handler (Prometheus format)
async fn metrics_handler(State(state): State<Arc<SharedState>>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::transport::peer::testing::peer;

    fn state() -> Arc<SharedState> {
        Arc::new(SharedState::new(Config::default()).unwrap())
    }

    #[tokio::test]
    async fn test_health_reports_version() {
        let Json(body) = health_handler(State(state())).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_status_reflects_mailbox() {
        let state = state();
        let (viewer, _rx) = peer();
        state
            .router
            .route_text(&viewer, r#"{"type":"offer","sdp":"A"}"#);

        let Json(body) = status_handler(State(state.clone())).await;
        assert_eq!(body["camera_connected"], false);
        assert_eq!(body["viewer_connected"], true);
        assert_eq!(body["offer_cached"], true);
        assert_eq!(body["cached_candidates"], 0);
    }

    #[tokio::test]
    async fn test_metrics_is_ok() {
        let response = metrics_handler(State(state())).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
