use std::time::Instant;

use axum::response::Response;

use crate::error::BridgeError;
use crate::observability::log_request_complete;
use crate::protocol::openai_chat::response_encoder::map_upstream_body;
use crate::state::AppState;
use crate::transport::UpstreamReply;
use crate::util::unix_now_secs;

use super::ExchangeContext;

#[inline]
fn ok_json_response(body_bytes: bytes::Bytes) -> Response {
    let mut response = Response::new(axum::body::Body::from(body_bytes));
    *response.status_mut() = http::StatusCode::OK;
    response.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    response
}

/// Map a buffered upstream reply to an `OpenAI` completion response.
pub(crate) fn handle_non_streaming(
    state: &AppState,
    ctx: &ExchangeContext<'_>,
    reply: UpstreamReply,
    start_time: Instant,
) -> Result<Response, BridgeError> {
    let UpstreamReply::Buffered(body) = reply else {
        return Err(BridgeError::Internal(
            "expected a buffered upstream reply".into(),
        ));
    };

    let completion = map_upstream_body(
        &body,
        ctx.client_model,
        state.reasoning_display(),
        || state.next_completion_id(),
        unix_now_secs(),
    )?;
    let encoded = serde_json::to_vec(&completion)
        .map_err(|e| BridgeError::Internal(format!("failed to encode completion: {e}")))?;

    log_request_complete(
        ctx.client_model,
        ctx.upstream_model,
        &completion.usage,
        start_time,
    );
    Ok(ok_json_response(bytes::Bytes::from(encoded)))
}
