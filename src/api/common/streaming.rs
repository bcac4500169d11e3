use std::convert::Infallible;
use std::time::Instant;

use axum::response::Response;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};

use crate::error::BridgeError;
use crate::observability::log_stream_complete;
use crate::protocol::reasoning::ReasoningDisplay;
use crate::stream::StreamTranscoder;
use crate::transport::UpstreamReply;

use super::ExchangeContext;

/// Wrap an open upstream stream into a transcoded `text/event-stream` response.
pub(crate) fn handle_streaming(
    display: ReasoningDisplay,
    ctx: &ExchangeContext<'_>,
    reply: UpstreamReply,
    start_time: Instant,
) -> Result<Response, BridgeError> {
    let UpstreamReply::Stream(response) = reply else {
        return Err(BridgeError::Internal(
            "expected a streaming upstream reply".into(),
        ));
    };

    let log = StreamLog {
        client_model: ctx.client_model.to_owned(),
        upstream_model: ctx.upstream_model.to_owned(),
        start_time,
    };
    let body = axum::body::Body::from_stream(transcode_stream(
        response.bytes_stream(),
        StreamTranscoder::new(display),
        log,
    ));
    Ok(sse_ok_response(body))
}

struct StreamLog {
    client_model: String,
    upstream_model: String,
    start_time: Instant,
}

impl StreamLog {
    fn complete(&self, terminated: bool) {
        log_stream_complete(
            &self.client_model,
            &self.upstream_model,
            terminated,
            self.start_time,
        );
    }
}

struct DriverState<S> {
    upstream: S,
    transcoder: StreamTranscoder,
    log: StreamLog,
    ended: bool,
}

/// Drive the transcoder over an upstream byte stream.
///
/// Each upstream chunk yields at most one output item holding every line it
/// completed. Dropping the returned stream drops the upstream body, which
/// releases its connection.
fn transcode_stream<S, E>(
    upstream: S,
    transcoder: StreamTranscoder,
    log: StreamLog,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        DriverState {
            upstream: Box::pin(upstream),
            transcoder,
            log,
            ended: false,
        },
        |mut state| async move {
            loop {
                if state.ended {
                    return None;
                }

                let mut out = Vec::new();
                match state.upstream.as_mut().next().await {
                    Some(Ok(chunk)) => {
                        state.transcoder.feed(&chunk, &mut out);
                        if state.transcoder.is_done() {
                            state.ended = true;
                            state.log.complete(true);
                        }
                    }
                    Some(Err(err)) => {
                        state.transcoder.fail();
                        state.ended = true;
                        let err = BridgeError::StreamAbort(err.to_string());
                        tracing::warn!(
                            model = %state.log.client_model,
                            upstream_model = %state.log.upstream_model,
                            error = %err,
                            "upstream stream aborted"
                        );
                        state.log.complete(false);
                    }
                    None => {
                        state.transcoder.finish(&mut out);
                        state.ended = true;
                        state.log.complete(false);
                    }
                }

                if !out.is_empty() {
                    return Some((Ok(Bytes::from(out)), state));
                }
            }
        },
    )
}

#[inline]
pub(crate) fn sse_ok_response(body: axum::body::Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    response
}
