//! Wire types for the upstream inference API.
//!
//! The upstream speaks a chat-completions dialect that carries model "thinking"
//! in provider-specific fields (`reasoning_content`, or `reasoning` on some
//! models). Response-side types only name the fields the bridge inspects; every
//! other field is kept in `extra` and re-serialized untouched. Reasoning fields
//! deserialize but never serialize, so they cannot leak to OpenAI clients.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::openai_chat::{ChatMessage, ChatStop};

/// Payload sent to the upstream `/chat/completions` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<ChatStop>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat_template_kwargs: Option<ChatTemplateKwargs>,
}

/// Template switches understood by thinking-capable upstream models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatTemplateKwargs {
    pub thinking: bool,
}

// ---------------------------------------------------------------------------
// Non-streaming response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub created: Option<u64>,
    #[serde(default)]
    pub choices: Vec<UpstreamChoice>,
    #[serde(default)]
    pub usage: Option<UpstreamUsage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub message: UpstreamMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpstreamMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl UpstreamMessage {
    #[must_use]
    pub fn reasoning_text(&self) -> Option<&str> {
        pick_reasoning(self.reasoning_content.as_deref(), self.reasoning.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UpstreamUsage {
    #[serde(default)]
    pub prompt_tokens: Option<u64>,
    #[serde(default)]
    pub completion_tokens: Option<u64>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
}

// ---------------------------------------------------------------------------
// Streaming chunk
// ---------------------------------------------------------------------------

/// One `data:` payload of the upstream event stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamChunk {
    #[serde(default, deserialize_with = "lenient")]
    pub choices: Vec<UpstreamChunkChoice>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A delta event: one choice of a streamed chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamChunkChoice {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub index: Option<u32>,
    #[serde(default, deserialize_with = "lenient")]
    pub delta: UpstreamDelta,
    #[serde(default, deserialize_with = "lenient")]
    pub finish_reason: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpstreamDelta {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing)]
    pub reasoning_content: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing)]
    pub reasoning: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl UpstreamDelta {
    /// Remove and return the reasoning fragment, if any.
    pub fn take_reasoning(&mut self) -> Option<String> {
        let content = self.reasoning_content.take();
        let plain = self.reasoning.take();
        match (content, plain) {
            (Some(text), _) if !text.is_empty() => Some(text),
            (_, Some(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}

/// Deserialize a chunk field, treating `null` or a value of the wrong shape as absent.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

fn pick_reasoning<'a>(primary: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    primary
        .filter(|text| !text.is_empty())
        .or_else(|| fallback.filter(|text| !text.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_keeps_unknown_fields_and_drops_reasoning_on_serialize() {
        let raw = r#"{"id":"c1","model":"m","created":7,"choices":[{"index":0,"delta":{"role":"assistant","reasoning_content":"hmm"},"finish_reason":null,"logprobs":null}]}"#;
        let chunk: UpstreamChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(
            chunk.choices[0].delta.reasoning_content.as_deref(),
            Some("hmm")
        );

        let out = serde_json::to_value(&chunk).unwrap();
        assert_eq!(out["id"], "c1");
        assert_eq!(out["created"], 7);
        assert_eq!(out["choices"][0]["delta"]["role"], "assistant");
        assert!(out["choices"][0]["delta"].get("reasoning_content").is_none());
        assert!(out["choices"][0].get("logprobs").is_some());
        assert!(out["choices"][0]["finish_reason"].is_null());
    }

    #[test]
    fn test_take_reasoning_prefers_reasoning_content() {
        let mut delta = UpstreamDelta {
            reasoning_content: Some("a".into()),
            reasoning: Some("b".into()),
            ..UpstreamDelta::default()
        };
        assert_eq!(delta.take_reasoning().as_deref(), Some("a"));
        assert!(delta.reasoning.is_none());

        let mut delta = UpstreamDelta {
            reasoning_content: Some(String::new()),
            reasoning: Some("b".into()),
            ..UpstreamDelta::default()
        };
        assert_eq!(delta.take_reasoning().as_deref(), Some("b"));
    }

    #[test]
    fn test_thinking_kwargs_only_serialized_when_set() {
        let mut req = UpstreamRequest {
            model: "m".into(),
            messages: vec![ChatMessage::user("hi")],
            temperature: 0.6,
            max_tokens: 16,
            stream: false,
            top_p: None,
            stop: None,
            presence_penalty: None,
            frequency_penalty: None,
            seed: None,
            chat_template_kwargs: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("chat_template_kwargs").is_none());

        req.chat_template_kwargs = Some(ChatTemplateKwargs { thinking: true });
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["chat_template_kwargs"]["thinking"], true);
    }
}
