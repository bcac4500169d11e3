use crate::error::BridgeError;
use crate::protocol::reasoning::{render_message, ReasoningDisplay};
use crate::protocol::upstream::{UpstreamResponse, UpstreamUsage};

use super::{ChatChoice, ChatResponse, ChatResponseMessage, ChatUsage};

/// Decode a buffered upstream body and map it to an `OpenAI` completion.
///
/// # Errors
///
/// Returns [`BridgeError::Decode`] when the body is not a valid upstream
/// chat-completion object.
pub fn map_upstream_body(
    body: &[u8],
    client_model: &str,
    display: ReasoningDisplay,
    fallback_id: impl FnOnce() -> String,
    now_secs: u64,
) -> Result<ChatResponse, BridgeError> {
    let response: UpstreamResponse = serde_json::from_slice(body)
        .map_err(|e| BridgeError::Decode(format!("malformed upstream response: {e}")))?;
    Ok(map_upstream_response(
        response,
        client_model,
        display,
        fallback_id,
        now_secs,
    ))
}

/// Map a decoded upstream response to an `OpenAI` completion.
///
/// `model` is always the name the caller asked for, not the upstream id.
#[must_use]
pub fn map_upstream_response(
    response: UpstreamResponse,
    client_model: &str,
    display: ReasoningDisplay,
    fallback_id: impl FnOnce() -> String,
    now_secs: u64,
) -> ChatResponse {
    let choices = response
        .choices
        .into_iter()
        .map(|choice| {
            let message = choice.message;
            let content = render_message(
                display,
                message.reasoning_text(),
                message.content.as_deref().unwrap_or_default(),
            );
            ChatChoice {
                index: choice.index,
                message: ChatResponseMessage {
                    role: message
                        .role
                        .filter(|role| !role.is_empty())
                        .unwrap_or_else(|| "assistant".to_string()),
                    content,
                },
                finish_reason: choice.finish_reason,
            }
        })
        .collect();

    ChatResponse {
        id: response
            .id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(fallback_id),
        object: "chat.completion".to_string(),
        created: response.created.unwrap_or(now_secs),
        model: client_model.to_string(),
        choices,
        usage: map_usage(response.usage),
    }
}

fn map_usage(usage: Option<UpstreamUsage>) -> ChatUsage {
    let usage = usage.unwrap_or_default();
    ChatUsage {
        prompt_tokens: usage.prompt_tokens.unwrap_or(0),
        completion_tokens: usage.completion_tokens.unwrap_or(0),
        total_tokens: usage.total_tokens.unwrap_or(0),
    }
}
