use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "relay-bridge is running",
        "config": {
            "relay": {
                "network": config.relay.network.to_string(),
                "url": config.relay.ws_url(),
            },
            "client_name": config.relay.client_name,
            "payment": if config.payment.webhook_url.is_some() { "webhook" } else { "log" },
            "log_level": config.features.log_level,
        }
    }))
}
