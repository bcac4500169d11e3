use crate::config::{GenerationConfig, TokenPolicy};
use crate::error::BridgeError;
use crate::protocol::upstream::{ChatTemplateKwargs, UpstreamRequest};
use crate::routing::ModelRouter;

use super::{ChatMessage, ChatRequest, Role};

/// Build the upstream payload from an inbound chat request.
///
/// Consumes the request so message bodies move into the upstream payload
/// without copying.
///
/// # Errors
///
/// Returns [`BridgeError::InvalidRequest`] when the message list is empty or
/// the model id is blank.
pub fn normalize_request(
    request: ChatRequest,
    generation: &GenerationConfig,
    router: &ModelRouter,
) -> Result<UpstreamRequest, BridgeError> {
    if request.messages.is_empty() {
        return Err(BridgeError::InvalidRequest(
            "'messages' must contain at least one message".into(),
        ));
    }
    let requested_model = request.model.trim();
    if requested_model.is_empty() {
        return Err(BridgeError::InvalidRequest("'model' must not be empty".into()));
    }

    let target = router.resolve(requested_model);
    if !target.mapped {
        tracing::debug!(model = requested_model, "model not in table, passing through");
    }
    let model = target.upstream_model.to_string();
    let max_tokens = effective_max_tokens(
        generation.token_policy,
        request.max_tokens,
        generation.min_tokens,
        generation.max_tokens,
    );
    let messages = inject_system_directive(request.messages, generation.system_directive.as_deref());

    Ok(UpstreamRequest {
        model,
        messages,
        temperature: request.temperature.unwrap_or(generation.default_temperature),
        max_tokens,
        stream: request.stream,
        top_p: request.top_p,
        stop: request.stop,
        presence_penalty: request.presence_penalty,
        frequency_penalty: request.frequency_penalty,
        seed: request.seed,
        chat_template_kwargs: generation
            .enable_thinking_mode
            .then_some(ChatTemplateKwargs { thinking: true }),
    })
}

/// Upstream `max_tokens` under the configured policy.
///
/// `Clamp` bounds the requested value (or `floor` when absent) to
/// `[floor, ceiling]`; `Override` always yields `ceiling`.
#[must_use]
pub fn effective_max_tokens(
    policy: TokenPolicy,
    requested: Option<u32>,
    floor: u32,
    ceiling: u32,
) -> u32 {
    match policy {
        TokenPolicy::Clamp => requested.unwrap_or(floor).max(floor).min(ceiling),
        TokenPolicy::Override => ceiling,
    }
}

/// Prepend the directive as a system message unless the caller already sent one.
#[must_use]
pub fn inject_system_directive(
    mut messages: Vec<ChatMessage>,
    directive: Option<&str>,
) -> Vec<ChatMessage> {
    let Some(directive) = directive else {
        return messages;
    };
    if messages.iter().any(|m| m.role == Role::System) {
        return messages;
    }
    messages.insert(0, ChatMessage::system(directive));
    messages
}
