use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::{into_axum_response, BridgeError};
use crate::protocol::openai_chat::ModelObject;
use crate::state::AppState;
use crate::util::unix_now_secs;

/// List the public model table in `OpenAI` format.
#[must_use]
pub fn handler(State(state): State<Arc<AppState>>) -> Response {
    match models_response_body(&state) {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                axum::http::HeaderValue::from_static("application/json"),
            )],
            Body::from(body),
        )
            .into_response(),
        Err(err) => into_axum_response(&err),
    }
}

fn models_response_body(state: &AppState) -> Result<Vec<u8>, BridgeError> {
    let created = unix_now_secs();
    let data: Vec<ModelObject<'_>> = state
        .model_router
        .listed_models()
        .iter()
        .map(|model| ModelObject {
            id: &model.id,
            object: "model",
            created,
            owned_by: &model.owned_by,
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({ "object": "list", "data": data }))
        .map_err(|e| BridgeError::Internal(format!("failed to encode model list: {e}")))
}
