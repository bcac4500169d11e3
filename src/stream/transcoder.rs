use serde_json::{Map, Value};

use crate::protocol::reasoning::{ReasoningDisplay, THINK_CLOSE, THINK_OPEN};
use crate::protocol::upstream::UpstreamChunk;

use super::sse::{data_payload, is_done_payload, push_data_line, LineBuffer, DONE_FRAME};

/// Lifecycle of one transcoded stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscoderPhase {
    /// No `<think>` block is open (always the case when reasoning is hidden).
    ReasoningClosed,
    /// A `<think>` block was opened and not yet closed.
    ReasoningOpen,
    /// The terminal marker was emitted or the upstream closed; nothing more is emitted.
    Done,
    /// The upstream stream failed mid-flight.
    Failed,
}

impl TranscoderPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, TranscoderPhase::Done | TranscoderPhase::Failed)
    }
}

/// Rewrites an upstream chat-completions event stream into a strictly
/// OpenAI-compatible one.
///
/// Feed it raw upstream bytes in arbitrary splits; output bytes are appended
/// to a caller-provided buffer. The output for a given upstream byte sequence
/// is the same no matter how that sequence was chunked.
#[derive(Debug)]
pub struct StreamTranscoder {
    display: ReasoningDisplay,
    phase: TranscoderPhase,
    lines: LineBuffer,
    /// Top-level fields of the last decoded chunk, reused for synthesized deltas.
    last_envelope: Option<Map<String, Value>>,
    last_index: u32,
    /// Drop the blank separator following a suppressed event.
    swallow_blank: bool,
}

impl StreamTranscoder {
    #[must_use]
    pub fn new(display: ReasoningDisplay) -> Self {
        Self {
            display,
            phase: TranscoderPhase::ReasoningClosed,
            lines: LineBuffer::new(),
            last_envelope: None,
            last_index: 0,
            swallow_blank: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> TranscoderPhase {
        self.phase
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.phase == TranscoderPhase::Done
    }

    /// Consume upstream bytes, appending every completed output line to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        if self.phase.is_terminal() {
            return;
        }
        let mut lines = std::mem::take(&mut self.lines);
        lines.feed(chunk, |line| self.process_line(line, out));
        self.lines = lines;
    }

    /// Handle upstream end-of-stream without a terminal marker.
    ///
    /// A buffered trailing fragment is processed as a final line, and an
    /// open `<think>` block is closed so the output matches buffered rendering.
    pub fn finish(&mut self, out: &mut Vec<u8>) {
        if self.phase.is_terminal() {
            return;
        }
        if let Some(rest) = self.lines.take_remainder() {
            self.process_line(&rest, out);
        }
        if !self.phase.is_terminal() {
            self.close_open_reasoning(out);
            self.phase = TranscoderPhase::Done;
        }
    }

    /// Mark the stream as failed; later input is ignored.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = TranscoderPhase::Failed;
        }
    }

    fn process_line(&mut self, line: &[u8], out: &mut Vec<u8>) {
        if self.phase.is_terminal() {
            return;
        }

        let Some(payload) = data_payload(line) else {
            if std::mem::take(&mut self.swallow_blank) && line.is_empty() {
                return;
            }
            out.extend_from_slice(line);
            out.push(b'\n');
            return;
        };
        self.swallow_blank = false;

        if is_done_payload(payload) {
            self.close_open_reasoning(out);
            out.extend_from_slice(DONE_FRAME);
            self.phase = TranscoderPhase::Done;
            return;
        }

        let Ok(chunk) = serde_json::from_slice::<UpstreamChunk>(payload) else {
            out.extend_from_slice(line);
            out.push(b'\n');
            return;
        };

        match self.rewrite_chunk(chunk) {
            Some(rewritten) => match serde_json::to_vec(&rewritten) {
                Ok(json) => push_data_line(out, &json),
                Err(_) => {
                    out.extend_from_slice(line);
                    out.push(b'\n');
                }
            },
            None => self.swallow_blank = true,
        }
    }

    /// Merge reasoning into content per display policy. Returns `None` when the
    /// chunk carried nothing but hidden reasoning.
    fn rewrite_chunk(&mut self, mut chunk: UpstreamChunk) -> Option<UpstreamChunk> {
        let mut dropped_reasoning = false;

        for choice in &mut chunk.choices {
            if let Some(index) = choice.index {
                self.last_index = index;
            }
            let reasoning = choice.delta.take_reasoning();

            if !self.display.is_visible() {
                dropped_reasoning |= reasoning.is_some();
                continue;
            }

            let mut prefix = String::new();
            if let Some(reasoning) = reasoning {
                if self.phase == TranscoderPhase::ReasoningClosed {
                    prefix.push_str(THINK_OPEN);
                    self.phase = TranscoderPhase::ReasoningOpen;
                }
                prefix.push_str(&reasoning);
            }

            let has_content = choice.delta.content.as_deref().is_some_and(|c| !c.is_empty());
            if self.phase == TranscoderPhase::ReasoningOpen
                && (has_content || choice.finish_reason.is_some())
            {
                prefix.push_str(THINK_CLOSE);
                self.phase = TranscoderPhase::ReasoningClosed;
            }

            if !prefix.is_empty() {
                if let Some(content) = choice.delta.content.take() {
                    prefix.push_str(&content);
                }
                choice.delta.content = Some(prefix);
            }
        }

        self.last_envelope = Some(envelope_of(&chunk));

        if dropped_reasoning && is_empty_event(&chunk) {
            return None;
        }
        Some(chunk)
    }

    fn close_open_reasoning(&mut self, out: &mut Vec<u8>) {
        if self.phase != TranscoderPhase::ReasoningOpen {
            return;
        }
        self.phase = TranscoderPhase::ReasoningClosed;

        let mut event = self.last_envelope.clone().unwrap_or_default();
        event.insert(
            "choices".to_string(),
            serde_json::json!([{
                "index": self.last_index,
                "delta": {"content": THINK_CLOSE},
                "finish_reason": null,
            }]),
        );
        if let Ok(json) = serde_json::to_vec(&event) {
            push_data_line(out, &json);
            out.push(b'\n');
        }
    }
}

/// Top-level chunk fields worth repeating on a synthesized event.
fn envelope_of(chunk: &UpstreamChunk) -> Map<String, Value> {
    chunk
        .extra
        .iter()
        .filter(|(key, _)| matches!(key.as_str(), "id" | "object" | "created" | "model"))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// A chunk whose choices carry no payload and which has no usage block.
fn is_empty_event(chunk: &UpstreamChunk) -> bool {
    let usage_present = chunk.extra.get("usage").is_some_and(|usage| !usage.is_null());
    !usage_present
        && chunk.choices.iter().all(|choice| {
            choice.finish_reason.is_none()
                && choice.delta.content.is_none()
                && choice.delta.extra.values().all(Value::is_null)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::reasoning::render_message;

    fn chunk(delta: &str, finish: Option<&str>) -> String {
        let finish = finish.map_or("null".to_string(), |f| format!("\"{f}\""));
        format!(
            "data: {{\"id\":\"c1\",\"object\":\"chat.completion.chunk\",\"created\":7,\"model\":\"up\",\"choices\":[{{\"index\":0,\"delta\":{delta},\"finish_reason\":{finish}}}]}}\n\n"
        )
    }

    /// Upstream stream for scenario B: reasoning "plan", content "Hi" + " there".
    fn scenario_b() -> Vec<u8> {
        let mut s = String::new();
        s.push_str(&chunk(r#"{"role":"assistant","reasoning_content":"pl"}"#, None));
        s.push_str(&chunk(r#"{"reasoning_content":"an"}"#, None));
        s.push_str(&chunk(r#"{"content":"Hi"}"#, None));
        s.push_str(&chunk(r#"{"content":" there"}"#, None));
        s.push_str(&chunk(r"{}", Some("stop")));
        s.push_str("data: [DONE]\n\n");
        s.into_bytes()
    }

    fn run(display: ReasoningDisplay, input: &[u8]) -> Vec<u8> {
        let mut transcoder = StreamTranscoder::new(display);
        let mut out = Vec::new();
        transcoder.feed(input, &mut out);
        transcoder.finish(&mut out);
        out
    }

    fn data_events(output: &[u8]) -> Vec<Value> {
        std::str::from_utf8(output)
            .unwrap()
            .lines()
            .filter_map(|line| line.strip_prefix("data: "))
            .filter(|payload| *payload != "[DONE]")
            .map(|payload| serde_json::from_str(payload).unwrap())
            .collect()
    }

    fn reassembled_content(output: &[u8]) -> String {
        data_events(output)
            .iter()
            .filter_map(|event| event["choices"][0]["delta"]["content"].as_str().map(str::to_owned))
            .collect()
    }

    #[test]
    fn test_hidden_scenario_b_ordering() {
        let out = run(ReasoningDisplay::Hidden, &scenario_b());
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(!text.contains("reasoning"));

        let events = data_events(&out);
        let contents: Vec<Option<&str>> = events
            .iter()
            .map(|e| e["choices"][0]["delta"]["content"].as_str())
            .collect();
        assert_eq!(contents, vec![None, Some("Hi"), Some(" there"), None]);
        assert_eq!(events[0]["choices"][0]["delta"]["role"], "assistant");
        assert_eq!(events[3]["choices"][0]["finish_reason"], "stop");
        assert_eq!(events[1]["id"], "c1");
        assert_eq!(events[1]["model"], "up");
        assert!(text.ends_with("data: [DONE]\n\n"));
        assert_eq!(text.matches("[DONE]").count(), 1);
    }

    #[test]
    fn test_hidden_reasoning_only_chunk_is_suppressed() {
        let out = run(ReasoningDisplay::Hidden, &scenario_b());
        // role chunk kept, second reasoning-only chunk dropped with its separator
        assert_eq!(data_events(&out).len(), 4);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("\n\n\n"));
    }

    #[test]
    fn test_visible_scenario_b_rendering() {
        let out = run(ReasoningDisplay::Visible, &scenario_b());
        assert_eq!(reassembled_content(&out), "<think>\nplan\n</think>\n\nHi there");
        let events = data_events(&out);
        assert_eq!(
            events[0]["choices"][0]["delta"]["content"],
            "<think>\npl"
        );
        assert_eq!(
            events[2]["choices"][0]["delta"]["content"],
            "\n</think>\n\nHi"
        );
    }

    #[test]
    fn test_visible_finish_closes_open_block() {
        let mut s = chunk(r#"{"reasoning":"only thoughts"}"#, None);
        s.push_str(&chunk(r"{}", Some("length")));
        s.push_str("data: [DONE]\n\n");
        let out = run(ReasoningDisplay::Visible, s.as_bytes());
        assert_eq!(
            reassembled_content(&out),
            "<think>\nonly thoughts\n</think>\n\n"
        );
    }

    #[test]
    fn test_visible_done_while_open_emits_closing_delta_first() {
        let mut s = chunk(r#"{"reasoning_content":"r"}"#, None);
        s.push_str("data: [DONE]\n\n");
        let out = run(ReasoningDisplay::Visible, s.as_bytes());
        let text = String::from_utf8(out.clone()).unwrap();
        let close_at = text.find("</think>").unwrap();
        let done_at = text.find("[DONE]").unwrap();
        assert!(close_at < done_at);
        assert_eq!(reassembled_content(&out), "<think>\nr\n</think>\n\n");
        let events = data_events(&out);
        assert_eq!(events[1]["id"], "c1");
    }

    #[test]
    fn test_nothing_after_done_is_emitted() {
        let mut s = String::from("data: [DONE]\n\n");
        s.push_str(&chunk(r#"{"content":"late"}"#, None));
        let mut transcoder = StreamTranscoder::new(ReasoningDisplay::Hidden);
        let mut out = Vec::new();
        transcoder.feed(s.as_bytes(), &mut out);
        transcoder.feed(b"data: more\n", &mut out);
        transcoder.finish(&mut out);
        assert_eq!(out, DONE_FRAME);
        assert!(transcoder.is_done());
    }

    #[test]
    fn test_every_split_point_gives_identical_output() {
        let mut input = scenario_b();
        // multi-byte content exercises splits inside a UTF-8 sequence
        let extra = chunk("{\"content\":\"caf\u{e9} \u{1f600}\"}", None);
        let tail = input.split_off(input.len() - DONE_FRAME.len());
        input.extend_from_slice(extra.as_bytes());
        input.extend_from_slice(&tail);

        for display in [ReasoningDisplay::Hidden, ReasoningDisplay::Visible] {
            let whole = run(display, &input);
            for split in 0..=input.len() {
                let mut transcoder = StreamTranscoder::new(display);
                let mut out = Vec::new();
                transcoder.feed(&input[..split], &mut out);
                transcoder.feed(&input[split..], &mut out);
                transcoder.finish(&mut out);
                assert_eq!(out, whole, "split at {split} ({display:?})");
            }
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_whole() {
        let input = scenario_b();
        let whole = run(ReasoningDisplay::Visible, &input);
        let mut transcoder = StreamTranscoder::new(ReasoningDisplay::Visible);
        let mut out = Vec::new();
        for byte in &input {
            transcoder.feed(std::slice::from_ref(byte), &mut out);
        }
        transcoder.finish(&mut out);
        assert_eq!(out, whole);
    }

    #[test]
    fn test_unparseable_line_forwarded_and_stream_continues() {
        let mut s = String::from("data: {not json\n\n");
        s.push_str(&chunk(r#"{"content":"ok"}"#, None));
        s.push_str("data: [DONE]\n\n");
        let mut transcoder = StreamTranscoder::new(ReasoningDisplay::Hidden);
        let mut out = Vec::new();
        transcoder.feed(s.as_bytes(), &mut out);
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("data: {not json\n\n"));
        assert!(text.contains("\"content\":\"ok\""));
        assert!(transcoder.is_done());
    }

    #[test]
    fn test_non_data_lines_pass_through() {
        let out = run(ReasoningDisplay::Hidden, b": keep-alive\r\nevent: ping\r\n\r\n");
        assert_eq!(out, b": keep-alive\nevent: ping\n\n");
    }

    #[test]
    fn test_trailing_fragment_processed_at_close() {
        let input = chunk(r#"{"content":"tail"}"#, None);
        let input = input.trim_end_matches('\n');
        let mut transcoder = StreamTranscoder::new(ReasoningDisplay::Hidden);
        let mut out = Vec::new();
        transcoder.feed(input.as_bytes(), &mut out);
        assert!(out.is_empty());
        transcoder.finish(&mut out);
        assert_eq!(reassembled_content(&out), "tail");
        assert_eq!(transcoder.phase(), TranscoderPhase::Done);
    }

    #[test]
    fn test_fail_stops_output() {
        let mut transcoder = StreamTranscoder::new(ReasoningDisplay::Hidden);
        let mut out = Vec::new();
        transcoder.feed(b"data: {\"choices\":[]", &mut out);
        transcoder.fail();
        transcoder.feed(b"}\n\n", &mut out);
        transcoder.finish(&mut out);
        assert!(out.is_empty());
        assert_eq!(transcoder.phase(), TranscoderPhase::Failed);
    }

    #[test]
    fn test_stream_matches_buffered_rendering() {
        for display in [ReasoningDisplay::Hidden, ReasoningDisplay::Visible] {
            for (reasoning, content) in [("plan", "Hi there"), ("", "plain"), ("r", "")] {
                let mut s = String::new();
                if !reasoning.is_empty() {
                    s.push_str(&chunk(
                        &format!("{{\"reasoning_content\":\"{reasoning}\"}}"),
                        None,
                    ));
                }
                if !content.is_empty() {
                    s.push_str(&chunk(&format!("{{\"content\":\"{content}\"}}"), None));
                }
                s.push_str(&chunk(r"{}", Some("stop")));
                s.push_str("data: [DONE]\n\n");

                let streamed = reassembled_content(&run(display, s.as_bytes()));
                let buffered = render_message(display, Some(reasoning), content);
                assert_eq!(streamed, buffered, "{display:?} {reasoning:?} {content:?}");
            }
        }
    }

    #[test]
    fn test_close_without_marker_closes_open_block() {
        let input = "data: {\"choices\":[{\"index\":0,\"delta\":{\"reasoning_content\":\"r\"}}]}\n\n";
        let out = run(ReasoningDisplay::Visible, input.as_bytes());
        assert_eq!(
            reassembled_content(&out),
            render_message(ReasoningDisplay::Visible, Some("r"), "")
        );
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("[DONE]"));
        assert!(text.ends_with("\n\n"));
    }

    #[test]
    fn test_null_fields_are_treated_as_absent() {
        let input = concat!(
            "data: {\"choices\":[{\"index\":null,\"delta\":{\"reasoning_content\":\"secret\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":null,\"finish_reason\":7}]}\n\n",
            "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ok\",\"reasoning\":null}}]}\n\n",
        );
        let out = run(ReasoningDisplay::Hidden, input.as_bytes());
        let text = String::from_utf8(out.clone()).unwrap();
        assert!(!text.contains("secret"));
        assert!(!text.contains("reasoning"));
        assert_eq!(reassembled_content(&out), "ok");
    }

    #[test]
    fn test_null_index_falls_back_to_last_seen_index() {
        let input = concat!(
            "data: {\"choices\":[{\"index\":2,\"delta\":{\"reasoning_content\":\"a\"}}]}\n\n",
            "data: {\"choices\":[{\"index\":null,\"delta\":{\"reasoning_content\":\"b\"}}]}\n\n",
            "data: [DONE]\n\n",
        );
        let out = run(ReasoningDisplay::Visible, input.as_bytes());
        let events = data_events(&out);
        let closing = events.last().unwrap();
        assert_eq!(closing["choices"][0]["index"], 2);
        assert_eq!(closing["choices"][0]["delta"]["content"], THINK_CLOSE);
    }
}
