use crate::protocol::openai_chat::ChatUsage;
use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber with the configured log level.
///
/// Maps config log levels to tracing levels:
/// - "DISABLED" -> no subscriber installed
/// - "WARNING" -> WARN
/// - "CRITICAL" -> ERROR
/// - Others map directly (TRACE, DEBUG, INFO, ERROR)
///
/// `json` switches the formatter to one JSON object per line.
pub fn init_tracing(log_level: &str, json: bool) {
    let level = log_level.to_uppercase();

    if level == "DISABLED" {
        return;
    }

    let filter =
        EnvFilter::try_new(tracing_level(&level)).unwrap_or_else(|_| EnvFilter::new("INFO"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn tracing_level(level: &str) -> &str {
    match level {
        "WARNING" => "WARN",
        "CRITICAL" => "ERROR",
        other => other,
    }
}

/// Log a completed non-streaming request with its token usage and latency.
pub fn log_request_complete(
    model: &str,
    upstream_model: &str,
    usage: &ChatUsage,
    start_time: std::time::Instant,
) {
    tracing::info!(
        model,
        upstream_model,
        stream = false,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        total_tokens = usage.total_tokens,
        latency_ms = start_time.elapsed().as_millis(),
        "request complete"
    );
}

/// Log the end of a streamed response.
pub fn log_stream_complete(
    model: &str,
    upstream_model: &str,
    terminated: bool,
    start_time: std::time::Instant,
) {
    tracing::info!(
        model,
        upstream_model,
        stream = true,
        terminated,
        latency_ms = start_time.elapsed().as_millis(),
        "stream complete"
    );
}
