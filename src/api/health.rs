use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Plain-text liveness probe for `GET /`.
#[must_use]
pub fn liveness_handler() -> &'static str {
    "openai-bridge is running"
}

/// Health check handler.
/// Returns JSON with status and config summary.
pub fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let config = &state.config;
    Json(json!({
        "status": "ok",
        "config": {
            "upstream_base_url": config.upstream.base_url,
            "known_models": state.model_router.known_model_count(),
            "generation": {
                "min_tokens": config.generation.min_tokens,
                "max_tokens": config.generation.max_tokens,
                "token_policy": config.generation.token_policy.to_string(),
                "default_temperature": config.generation.default_temperature,
                "enable_thinking_mode": config.generation.enable_thinking_mode,
                "system_directive": config.generation.system_directive.is_some(),
            },
            "features": {
                "show_reasoning": config.features.show_reasoning,
                "log_level": config.features.log_level,
            }
        }
    }))
}
