//! HTTP server implementation using Axum.

use std::sync::Arc;

use agendum_channels::LiveEventHub;
use agendum_core::config::{GatewayConfig, PushConfig};
use agendum_core::error::{AgendumError, Result};
use agendum_core::traits::{Mailer, PushSender};
use agendum_store::AgendumDb;
use axum::{
    Router,
    routing::{get, post, put},
};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::ws;

/// Shared state for the gateway server.
pub struct AppState {
    pub db: Arc<Mutex<AgendumDb>>,
    /// Live-event hub shared with the reminder dispatcher.
    pub hub: LiveEventHub,
    pub push: Arc<dyn PushSender>,
    pub mailer: Arc<dyn Mailer>,
    pub push_config: PushConfig,
    pub start_time: std::time::Instant,
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        .route(
            "/api/notifications/vapid-public-key",
            get(routes::vapid_public_key),
        )
        .route("/api/users", post(routes::create_user))
        .route("/api/users/{id}", get(routes::get_user))
        .route("/api/users/{id}/subscription", put(routes::save_subscription))
        .route(
            "/api/users/{id}/appointments",
            post(routes::create_appointment).get(routes::list_appointments),
        )
        .route("/api/appointments/{id}", put(routes::reschedule_appointment))
        .route(
            "/api/users/{id}/billing/subscribe-pro",
            post(routes::subscribe_pro),
        )
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>, config: &GatewayConfig) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AgendumError::Gateway(format!("bind {addr}: {e}")))?;
    tracing::info!("🌐 Gateway listening on http://{addr}");

    axum::serve(listener, build_router(state))
        .await
        .map_err(|e| AgendumError::Gateway(format!("serve: {e}")))?;
    Ok(())
}
