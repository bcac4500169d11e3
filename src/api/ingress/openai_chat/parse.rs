use crate::error::BridgeError;
use crate::protocol::openai_chat::ChatRequest;

pub(crate) fn parse_chat_request(body: &bytes::Bytes) -> Result<ChatRequest, BridgeError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(BridgeError::InvalidRequest("Request body is empty".into()));
    }
    serde_json::from_slice(body)
        .map_err(|e| BridgeError::InvalidRequest(format!("Invalid chat completion request body: {e}")))
}
