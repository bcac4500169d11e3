//! Standalone mock of a reasoning-capable chat-completions upstream.
//!
//! Point the bridge at it with `UPSTREAM_BASE_URL=http://127.0.0.1:19001/v1`.
//! `MOCK_SCENARIO` selects the payload (`text`, `reasoning`, `reasoning_alt`,
//! `error`); `MOCK_MODE` forces `stream` or `nonstream`, otherwise the
//! request's own `"stream":true` flag decides.
use std::convert::Infallible;
use std::env;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use http::{header, HeaderValue, Method, Request, Response, StatusCode};
use http_body_util::BodyExt;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as AutoBuilder;
use tokio::net::TcpListener;

const DEFAULT_UPSTREAM_PORT: u16 = 19_001;

#[derive(Copy, Clone)]
enum MockMode {
    Auto,
    Nonstream,
    Stream,
}

#[derive(Copy, Clone)]
enum MockScenario {
    Text,
    Reasoning,
    ReasoningAlt,
    Error,
}

struct RequestStats {
    chat: AtomicU64,
    stream: AtomicU64,
}

impl RequestStats {
    const fn new() -> Self {
        Self {
            chat: AtomicU64::new(0),
            stream: AtomicU64::new(0),
        }
    }

    fn record(&self, stream: bool) {
        self.chat.fetch_add(1, Ordering::Relaxed);
        if stream {
            self.stream.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> (u64, u64) {
        (
            self.chat.load(Ordering::Relaxed),
            self.stream.load(Ordering::Relaxed),
        )
    }

    fn reset(&self) {
        self.chat.store(0, Ordering::Relaxed);
        self.stream.store(0, Ordering::Relaxed);
    }
}

struct MockState {
    mode: MockMode,
    scenario: MockScenario,
    stats: RequestStats,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let port = env_u16("UPSTREAM_PORT", DEFAULT_UPSTREAM_PORT);
    let state = Arc::new(MockState {
        mode: parse_mode(),
        scenario: parse_scenario(),
        stats: RequestStats::new(),
    });

    let listener = TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap_or_else(|err| panic!("failed to bind mock upstream on 127.0.0.1:{port}: {err}"));
    eprintln!("mock upstream listening on http://127.0.0.1:{port}/v1");

    let conn_builder = AutoBuilder::new(TokioExecutor::new());
    loop {
        let (stream, remote_addr) = match listener.accept().await {
            Ok((stream, remote_addr)) => (stream, remote_addr),
            Err(err) => {
                eprintln!("accept error: {err}");
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let conn_builder = conn_builder.clone();
        let service_state = Arc::clone(&state);
        let service = service_fn(move |request: Request<Incoming>| {
            let state_ref = Arc::clone(&service_state);
            async move { Ok::<_, Infallible>(handle_request(request, &state_ref).await) }
        });

        tokio::spawn(async move {
            if let Err(err) = conn_builder.serve_connection(io, service).await {
                eprintln!("mock upstream connection error from {remote_addr}: {err}");
            }
        });
    }
}

fn env_u16(name: &str, default: u16) -> u16 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(default)
}

fn parse_mode() -> MockMode {
    match env::var("MOCK_MODE").as_deref() {
        Ok("stream") => MockMode::Stream,
        Ok("nonstream") => MockMode::Nonstream,
        Ok("auto") | Err(_) => MockMode::Auto,
        Ok(other) => {
            eprintln!("unknown MOCK_MODE '{other}', fallback to auto");
            MockMode::Auto
        }
    }
}

fn parse_scenario() -> MockScenario {
    match env::var("MOCK_SCENARIO").as_deref() {
        Ok("text") => MockScenario::Text,
        Ok("reasoning_alt") => MockScenario::ReasoningAlt,
        Ok("error") => MockScenario::Error,
        Ok("reasoning") | Err(_) => MockScenario::Reasoning,
        Ok(other) => {
            eprintln!("unknown MOCK_SCENARIO '{other}', fallback to reasoning");
            MockScenario::Reasoning
        }
    }
}

async fn handle_request(request: Request<Incoming>, state: &Arc<MockState>) -> Response<Full<Bytes>> {
    let (parts, body) = request.into_parts();
    let body = read_request_body(body).await;

    let method = parts.method;
    let path = parts.uri.path();

    if method == Method::GET && path == "/_mock/stats" {
        return stats_response(state);
    }
    if method == Method::POST && path == "/_mock/reset" {
        state.stats.reset();
        return simple_response_static(StatusCode::OK, "application/json", br#"{"ok":true}"#);
    }
    if !matches!(path, "/v1/chat/completions" | "/chat/completions") {
        return simple_response_static(
            StatusCode::NOT_FOUND,
            "application/json",
            br#"{"error":{"message":"not found"}}"#,
        );
    }
    if method != Method::POST {
        return simple_response_static(
            StatusCode::METHOD_NOT_ALLOWED,
            "application/json",
            br#"{"error":{"message":"method not allowed"}}"#,
        );
    }

    let is_stream = match state.mode {
        MockMode::Stream => true,
        MockMode::Nonstream => false,
        MockMode::Auto => requests_stream(&body),
    };
    state.stats.record(is_stream);

    if matches!(state.scenario, MockScenario::Error) {
        return simple_response_static(
            StatusCode::SERVICE_UNAVAILABLE,
            "application/json",
            br#"{"error":{"message":"mock injected overload"}}"#,
        );
    }

    if is_stream {
        streaming_response(state.scenario)
    } else {
        non_streaming_response(state.scenario)
    }
}

async fn read_request_body(body: Incoming) -> Bytes {
    match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => Bytes::new(),
    }
}

fn requests_stream(body: &[u8]) -> bool {
    let compact: Vec<u8> = body
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    compact.windows(13).any(|w| w == b"\"stream\":true")
}

fn stats_response(state: &MockState) -> Response<Full<Bytes>> {
    let (chat, stream) = state.stats.snapshot();
    let body = format!("{{\"chat_requests\":{chat},\"stream_requests\":{stream}}}");
    simple_response(
        StatusCode::OK,
        "application/json",
        Bytes::from(body.into_bytes()),
    )
}

fn non_streaming_response(scenario: MockScenario) -> Response<Full<Bytes>> {
    let body = match scenario {
        MockScenario::Text => NONSTREAM_TEXT,
        MockScenario::Reasoning => NONSTREAM_REASONING,
        MockScenario::ReasoningAlt => NONSTREAM_REASONING_ALT,
        MockScenario::Error => br#"{"error":{"message":"mock injected overload"}}"#,
    };
    simple_response_static(StatusCode::OK, "application/json", body)
}

fn streaming_response(scenario: MockScenario) -> Response<Full<Bytes>> {
    let body = match scenario {
        MockScenario::Text => STREAM_TEXT,
        MockScenario::Reasoning => STREAM_REASONING,
        MockScenario::ReasoningAlt => STREAM_REASONING_ALT,
        MockScenario::Error => b"data: {\"error\":{\"message\":\"mock injected overload\"}}\n\n",
    };
    let mut response = simple_response_static(StatusCode::OK, "text/event-stream", body);
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

fn simple_response(
    status: StatusCode,
    content_type: &'static str,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn simple_response_static(
    status: StatusCode,
    content_type: &'static str,
    body: &'static [u8],
) -> Response<Full<Bytes>> {
    simple_response(status, content_type, Bytes::from_static(body))
}

const NONSTREAM_TEXT: &[u8] = br#"{"id":"chatcmpl-mock","object":"chat.completion","created":1,"model":"mock/m1","choices":[{"index":0,"message":{"role":"assistant","content":"ok"},"finish_reason":"stop"}],"usage":{"prompt_tokens":1,"completion_tokens":1,"total_tokens":2}}"#;
const NONSTREAM_REASONING: &[u8] = br#"{"id":"chatcmpl-mock","object":"chat.completion","created":1,"model":"mock/m1","choices":[{"index":0,"message":{"role":"assistant","content":"Hi there","reasoning_content":"The user greets me. I greet back."},"finish_reason":"stop"}],"usage":{"prompt_tokens":5,"completion_tokens":9,"total_tokens":14}}"#;
const NONSTREAM_REASONING_ALT: &[u8] = br#"{"id":"chatcmpl-mock","object":"chat.completion","created":1,"model":"mock/m1","choices":[{"index":0,"message":{"role":"assistant","content":"Hi there","reasoning":"Short plan."},"finish_reason":"stop"}]}"#;
const STREAM_TEXT: &[u8] = b"data: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"content\":\"o\"},\"finish_reason\":null}]}\n\ndata: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"k\"},\"finish_reason\":\"stop\"}]}\n\ndata: [DONE]\n\n";
const STREAM_REASONING: &[u8] = b": upstream keep-alive\n\ndata: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"reasoning_content\":\"The user greets me. \"},\"finish_reason\":null}]}\n\ndata: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"reasoning_content\":\"I greet back.\"},\"finish_reason\":null}]}\n\ndata: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\ndata: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\" there\"},\"finish_reason\":null}]}\n\ndata: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":9,\"total_tokens\":14}}\n\ndata: [DONE]\n\n";
const STREAM_REASONING_ALT: &[u8] = b"data: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\",\"reasoning\":\"Short plan.\"},\"finish_reason\":null}]}\r\n\r\ndata: {\"id\":\"chatcmpl-mock\",\"object\":\"chat.completion.chunk\",\"created\":1,\"model\":\"mock/m1\",\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hi there\"},\"finish_reason\":\"stop\"}]}\r\n\r\ndata: [DONE]\r\n\r\n";
