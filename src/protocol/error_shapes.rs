use crate::error::ErrorCategory;

fn openai_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest
        | ErrorCategory::NotFound
        | ErrorCategory::MethodNotAllowed
        | ErrorCategory::PayloadTooLarge => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::Permission => "permission_error",
        ErrorCategory::RateLimit => "rate_limit_error",
        ErrorCategory::Timeout | ErrorCategory::BadGateway => "upstream_error",
        ErrorCategory::ServerError | ErrorCategory::Unknown => "server_error",
    }
}

fn openai_error_code(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request",
        ErrorCategory::Authentication => "invalid_api_key",
        ErrorCategory::Permission => "permission_denied",
        ErrorCategory::NotFound => "not_found",
        ErrorCategory::MethodNotAllowed => "method_not_allowed",
        ErrorCategory::PayloadTooLarge => "payload_too_large",
        ErrorCategory::RateLimit => "rate_limit_exceeded",
        ErrorCategory::Timeout => "upstream_timeout",
        ErrorCategory::BadGateway => "bad_gateway",
        ErrorCategory::ServerError | ErrorCategory::Unknown => "server_error",
    }
}

#[must_use]
pub(crate) fn openai_error_payload(cat: ErrorCategory, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": openai_error_type(cat),
            "code": openai_error_code(cat),
        }
    })
}

/// Extract a caller-facing message from an upstream error body.
///
/// Prefers `error.message` (or a top-level `message`/`detail`) when the body is
/// JSON and falls back to the raw text. Output is capped at 500 bytes.
#[must_use]
pub(crate) fn sanitize_upstream_error(body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        let message = json
            .get("error")
            .and_then(|e| e.get("message"))
            .or_else(|| json.get("error").filter(|e| e.is_string()))
            .or_else(|| json.get("message"))
            .or_else(|| json.get("detail"))
            .and_then(serde_json::Value::as_str);
        if let Some(msg) = message {
            return truncate_message(msg);
        }
    }

    truncate_message(String::from_utf8_lossy(body).trim())
}

fn truncate_message(msg: &str) -> String {
    const MAX_LEN: usize = 500;

    if msg.len() <= MAX_LEN {
        return msg.to_string();
    }
    let mut end = MAX_LEN;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &msg[..end])
}
