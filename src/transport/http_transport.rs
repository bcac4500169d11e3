use std::time::Duration;

use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::config::ServerConfig;
use crate::error::BridgeError;
use crate::protocol::error_shapes::sanitize_upstream_error;
use crate::protocol::upstream::UpstreamRequest;

use super::prepared_upstream::PreparedUpstream;
use super::retry_policy::RetryPolicy;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Upper bound on how much of a non-2xx body is read for the error message.
const ERROR_BODY_MAX_BYTES: usize = 64 * 1024;

/// Successful outcome of one upstream call.
#[derive(Debug)]
pub enum UpstreamReply {
    /// The complete JSON body of a non-streaming call.
    Buffered(Bytes),
    /// A 2xx streaming response whose body has not been read yet.
    Stream(reqwest::Response),
}

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
) -> Result<reqwest::Client, reqwest::Error> {
    // No client-wide timeout: streams may run far longer than the per-attempt
    // limit, which is enforced around each attempt instead.
    reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .build()
}

/// HTTP transport layer wrapping a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
    max_body_bytes: usize,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Create a new transport with connection pooling and timeouts from the given server config.
    #[must_use]
    pub fn new(config: &ServerConfig, retry: RetryPolicy) -> Self {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let client = match build_reqwest_client(
            config.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
        ) {
            Ok(client) => client,
            Err(err) => {
                tracing::error!(error = %err, "failed to build configured reqwest client, falling back to default client");
                reqwest::Client::new()
            }
        };

        Self {
            client,
            timeout: Duration::from_secs(config.timeout),
            max_body_bytes: config.max_body_bytes,
            retry,
        }
    }

    /// Send a chat-completion request upstream under the retry policy.
    ///
    /// Buffered calls succeed once the whole body has been read within the
    /// per-attempt timeout. Streaming calls succeed as soon as a 2xx status and
    /// headers arrive; the body is left for the caller to consume.
    ///
    /// # Errors
    ///
    /// Returns the last attempt's error: [`BridgeError::Upstream`] for a
    /// non-2xx status, [`BridgeError::Timeout`], [`BridgeError::Transport`], or
    /// [`BridgeError::PayloadTooLarge`] when a buffered body exceeds the ceiling.
    pub async fn send(
        &self,
        upstream: &PreparedUpstream,
        request: &UpstreamRequest,
    ) -> Result<UpstreamReply, BridgeError> {
        let payload = serde_json::to_vec(request)
            .map(Bytes::from)
            .map_err(|e| BridgeError::Internal(format!("failed to encode upstream request: {e}")))?;
        let stream = request.stream;

        self.retry
            .run(|attempt| {
                let payload = payload.clone();
                async move {
                    let result = self.attempt(upstream, payload, stream).await;
                    if let Err(err) = &result {
                        tracing::warn!(
                            attempt = attempt + 1,
                            max_attempts = self.retry.max_attempts(),
                            stream,
                            error = %err,
                            "upstream attempt failed"
                        );
                    }
                    result
                }
            })
            .await
    }

    async fn attempt(
        &self,
        upstream: &PreparedUpstream,
        payload: Bytes,
        stream: bool,
    ) -> Result<UpstreamReply, BridgeError> {
        let work = async {
            let response = self.execute(upstream, payload, stream).await?;
            let response = ensure_success(response).await?;
            if stream {
                Ok(UpstreamReply::Stream(response))
            } else {
                read_capped(response, self.max_body_bytes)
                    .await
                    .map(UpstreamReply::Buffered)
            }
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Timeout(format!(
                "no upstream response within {}s",
                self.timeout.as_secs()
            ))),
        }
    }

    async fn execute(
        &self,
        upstream: &PreparedUpstream,
        payload: Bytes,
        stream: bool,
    ) -> Result<reqwest::Response, BridgeError> {
        let mut request = reqwest::Request::new(http::Method::POST, upstream.chat_url().clone());
        *request.headers_mut() = upstream.headers(stream).clone();
        *request.body_mut() = Some(reqwest::Body::from(payload));

        self.client.execute(request).await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> BridgeError {
    if err.is_timeout() {
        BridgeError::Timeout(err.to_string())
    } else {
        BridgeError::Transport(err.to_string())
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, BridgeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = read_prefix(response, ERROR_BODY_MAX_BYTES).await;
    Err(BridgeError::Upstream {
        status: status.as_u16(),
        message: sanitize_upstream_error(&body),
    })
}

/// Read at most `limit` bytes of a body; read errors end the read early.
async fn read_prefix(response: reqwest::Response, limit: usize) -> Bytes {
    let mut body = BytesMut::new();
    let mut chunks = response.bytes_stream();
    while let Some(Ok(chunk)) = chunks.next().await {
        let room = limit.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= limit {
            break;
        }
    }
    body.freeze()
}

async fn read_capped(response: reqwest::Response, limit: usize) -> Result<Bytes, BridgeError> {
    if let Some(len) = response.content_length() {
        if len > limit as u64 {
            return Err(too_large(limit));
        }
    }

    let mut body = BytesMut::new();
    let mut chunks = response.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        if body.len() + chunk.len() > limit {
            return Err(too_large(limit));
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

fn too_large(limit: usize) -> BridgeError {
    BridgeError::PayloadTooLarge(format!("upstream response exceeds {limit} bytes"))
}
