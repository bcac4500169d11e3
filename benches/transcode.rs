use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use openai_bridge::protocol::openai_chat::decoder::normalize_request;
use openai_bridge::protocol::openai_chat::ChatRequest;
use openai_bridge::protocol::reasoning::ReasoningDisplay;
use openai_bridge::config::AppConfig;
use openai_bridge::routing::ModelRouter;
use openai_bridge::stream::StreamTranscoder;

fn chunk_frame(delta: &str, finish_reason: &str) -> String {
    format!(
        "data: {{\"id\":\"chatcmpl-bench\",\"object\":\"chat.completion.chunk\",\"created\":1727000000,\"model\":\"deepseek-ai/deepseek-r1\",\"choices\":[{{\"index\":0,\"delta\":{delta},\"finish_reason\":{finish_reason}}}]}}\n\n"
    )
}

/// A reasoning-heavy upstream stream: `reasoning_events` thinking deltas,
/// then `content_events` answer deltas, then the terminal marker.
fn sample_reasoning_stream(reasoning_events: usize, content_events: usize) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(&chunk_frame(
        "{\"role\":\"assistant\",\"reasoning_content\":\"\"}",
        "null",
    ));
    for i in 0..reasoning_events {
        out.push_str(&chunk_frame(
            &format!("{{\"reasoning_content\":\"step {i} of the plan \"}}"),
            "null",
        ));
    }
    for i in 0..content_events {
        out.push_str(&chunk_frame(
            &format!("{{\"content\":\"token{i} \"}}"),
            "null",
        ));
    }
    out.push_str(&chunk_frame("{}", "\"stop\""));
    out.push_str("data: [DONE]\n\n");
    out.into_bytes()
}

fn run_transcoder(display: ReasoningDisplay, input: &[u8], split: usize) -> usize {
    let mut transcoder = StreamTranscoder::new(display);
    let mut out = Vec::with_capacity(input.len());
    for piece in input.chunks(split) {
        transcoder.feed(piece, &mut out);
    }
    transcoder.finish(&mut out);
    out.len()
}

fn bench_stream_transcode(c: &mut Criterion) {
    let input = sample_reasoning_stream(200, 400);
    let mut group = c.benchmark_group("stream_transcode");
    group.throughput(Throughput::Bytes(input.len() as u64));

    group.bench_function("hidden_whole_body", |b| {
        b.iter(|| run_transcoder(ReasoningDisplay::Hidden, black_box(&input), input.len()));
    });
    group.bench_function("visible_whole_body", |b| {
        b.iter(|| run_transcoder(ReasoningDisplay::Visible, black_box(&input), input.len()));
    });
    // Network reads rarely line up with event boundaries.
    group.bench_function("hidden_split_61", |b| {
        b.iter(|| run_transcoder(ReasoningDisplay::Hidden, black_box(&input), 61));
    });
    group.bench_function("visible_split_61", |b| {
        b.iter(|| run_transcoder(ReasoningDisplay::Visible, black_box(&input), 61));
    });
    group.finish();
}

fn bench_normalize_request(c: &mut Criterion) {
    let config = AppConfig::default();
    let router = ModelRouter::new(&config);
    let body = serde_json::json!({
        "model": "gpt-4o",
        "messages": (0..50).map(|i| serde_json::json!({
            "role": if i % 2 == 0 { "user" } else { "assistant" },
            "content": format!("message {i} ").repeat(40),
        })).collect::<Vec<_>>(),
        "max_tokens": 4096,
        "temperature": 0.2,
        "stream": true
    });
    let raw = serde_json::to_vec(&body).expect("serialize sample request");

    c.bench_function("normalize_request_50msg", |b| {
        b.iter(|| {
            let request: ChatRequest =
                serde_json::from_slice(black_box(&raw)).expect("parse sample request");
            let upstream = normalize_request(request, &config.generation, &router)
                .expect("normalize sample request");
            serde_json::to_vec(&upstream).expect("encode upstream request")
        });
    });
}

criterion_group!(benches, bench_stream_transcode, bench_normalize_request);
criterion_main!(benches);
