use crate::protocol::error_shapes::openai_error_payload;

/// Error type shared by every stage of the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("Upstream error: status={status}, message={message}")]
    Upstream { status: u16, message: String },
    #[error("Upstream timeout: {0}")]
    Timeout(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Stream aborted: {0}")]
    StreamAbort(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Broad error category for status code and error type selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    Permission,
    NotFound,
    MethodNotAllowed,
    PayloadTooLarge,
    RateLimit,
    Timeout,
    BadGateway,
    ServerError,
    Unknown,
}

/// Map an upstream HTTP status code to an error category.
#[must_use]
pub fn category_from_upstream_status(status: u16) -> ErrorCategory {
    match status {
        400 | 422 => ErrorCategory::InvalidRequest,
        401 => ErrorCategory::Authentication,
        403 => ErrorCategory::Permission,
        404 => ErrorCategory::NotFound,
        413 => ErrorCategory::PayloadTooLarge,
        429 => ErrorCategory::RateLimit,
        500..=599 => ErrorCategory::ServerError,
        _ => ErrorCategory::Unknown,
    }
}

impl BridgeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::InvalidRequest(_) => ErrorCategory::InvalidRequest,
            BridgeError::NotFound(_) => ErrorCategory::NotFound,
            BridgeError::MethodNotAllowed(_) => ErrorCategory::MethodNotAllowed,
            BridgeError::PayloadTooLarge(_) => ErrorCategory::PayloadTooLarge,
            BridgeError::Timeout(_) => ErrorCategory::Timeout,
            BridgeError::Transport(_) | BridgeError::Decode(_) | BridgeError::StreamAbort(_) => {
                ErrorCategory::BadGateway
            }
            BridgeError::Config(_) | BridgeError::Internal(_) => ErrorCategory::ServerError,
            BridgeError::Upstream { status, .. } => category_from_upstream_status(*status),
        }
    }

    /// Whether a failed upstream attempt may be repeated.
    ///
    /// Connection failures, timeouts and non-2xx upstream statuses are retried;
    /// oversized bodies and local failures are not.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            BridgeError::Transport(_) | BridgeError::Timeout(_) | BridgeError::Upstream { .. }
        )
    }

    /// HTTP status reported to the caller for this error.
    #[must_use]
    pub fn status_code(&self) -> http::StatusCode {
        if let BridgeError::Upstream { status, .. } = self {
            return http::StatusCode::from_u16(*status).unwrap_or(http::StatusCode::BAD_GATEWAY);
        }
        http_status_for_category(self.category())
    }

    /// Message reported to the caller: the upstream-provided text when there is
    /// one, else the local description.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            BridgeError::Upstream { message, .. } if !message.is_empty() => message.clone(),
            other => other.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Category -> HTTP status code
// ---------------------------------------------------------------------------

fn http_status_for_category(cat: ErrorCategory) -> http::StatusCode {
    match cat {
        ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
        ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
        ErrorCategory::Permission => http::StatusCode::FORBIDDEN,
        ErrorCategory::NotFound => http::StatusCode::NOT_FOUND,
        ErrorCategory::MethodNotAllowed => http::StatusCode::METHOD_NOT_ALLOWED,
        ErrorCategory::PayloadTooLarge => http::StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::RateLimit => http::StatusCode::TOO_MANY_REQUESTS,
        ErrorCategory::Timeout => http::StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::BadGateway => http::StatusCode::BAD_GATEWAY,
        ErrorCategory::ServerError | ErrorCategory::Unknown => {
            http::StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ---------------------------------------------------------------------------
// Failure reporting
// ---------------------------------------------------------------------------

/// Format an error as `(status_code, {"error":{message,type,code}})`.
#[must_use]
pub fn format_error(err: &BridgeError) -> (http::StatusCode, serde_json::Value) {
    let status = err.status_code();
    let body = openai_error_payload(err.category(), &err.client_message());
    (status, body)
}

/// Convert a `BridgeError` into an axum response.
#[must_use]
pub fn into_axum_response(err: &BridgeError) -> axum::response::Response {
    use axum::response::IntoResponse;
    let (status, body) = format_error(err);
    (status, axum::Json(body)).into_response()
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        into_axum_response(&self)
    }
}
