use crate::config::UpstreamConfig;
use crate::error::BridgeError;

/// Precomputed upstream endpoint and headers, built once at startup.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    chat_url: url::Url,
    static_headers: http::HeaderMap,
    stream_headers: http::HeaderMap,
}

impl PreparedUpstream {
    /// Build the chat-completions endpoint and static headers from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the base URL does not parse or the
    /// API key is not a valid header value.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, BridgeError> {
        let base = upstream.base_url.trim().trim_end_matches('/');
        let chat_url = url::Url::parse(&format!("{base}/chat/completions"))
            .map_err(|e| BridgeError::Config(format!("invalid upstream base_url: {e}")))?;

        let static_headers = Self::build_headers(&upstream.api_key)?;
        let mut stream_headers = static_headers.clone();
        stream_headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("text/event-stream"),
        );

        Ok(Self {
            chat_url,
            static_headers,
            stream_headers,
        })
    }

    #[must_use]
    pub fn chat_url(&self) -> &url::Url {
        &self.chat_url
    }

    /// Headers for one upstream call; streaming calls also accept `text/event-stream`.
    #[must_use]
    pub fn headers(&self, stream: bool) -> &http::HeaderMap {
        if stream {
            &self.stream_headers
        } else {
            &self.static_headers
        }
    }

    fn build_headers(api_key: &str) -> Result<http::HeaderMap, BridgeError> {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        let mut auth = http::HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| BridgeError::Config("upstream api_key is not a valid header value".into()))?;
        auth.set_sensitive(true);
        headers.insert(http::header::AUTHORIZATION, auth);
        Ok(headers)
    }
}
