use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::response::Response;

use crate::api::common::{handle_non_streaming, handle_streaming, ExchangeContext};
use crate::error::{into_axum_response, BridgeError};
use crate::protocol::openai_chat::decoder::normalize_request;
use crate::state::AppState;

pub(crate) mod parse;

use self::parse::parse_chat_request;

/// `POST /v1/chat/completions`.
pub async fn handler(State(state): State<Arc<AppState>>, body: bytes::Bytes) -> Response {
    match handler_inner(&state, body).await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(error = %err, status = err.status_code().as_u16(), "chat completion failed");
            into_axum_response(&err)
        }
    }
}

async fn handler_inner(state: &AppState, body: bytes::Bytes) -> Result<Response, BridgeError> {
    let start_time = Instant::now();
    let request = parse_chat_request(&body)?;
    let client_model = request.model.trim().to_owned();

    let upstream_request =
        normalize_request(request, &state.config.generation, &state.model_router)?;
    let ctx = ExchangeContext {
        client_model: &client_model,
        upstream_model: &upstream_request.model,
    };
    tracing::debug!(
        model = ctx.client_model,
        upstream_model = ctx.upstream_model,
        stream = upstream_request.stream,
        max_tokens = upstream_request.max_tokens,
        messages = upstream_request.messages.len(),
        "forwarding chat completion"
    );

    let reply = state
        .transport
        .send(&state.upstream, &upstream_request)
        .await?;

    if upstream_request.stream {
        handle_streaming(state.reasoning_display(), &ctx, reply, start_time)
    } else {
        handle_non_streaming(state, &ctx, reply, start_time)
    }
}
