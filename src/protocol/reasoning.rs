//! Rendering of upstream reasoning text for OpenAI clients.
//!
//! Streaming and non-streaming paths share these delimiters so a reassembled
//! stream is byte-identical to the buffered response.

/// Opens a visible reasoning block.
pub const THINK_OPEN: &str = "<think>\n";
/// Closes a visible reasoning block and separates it from the answer.
pub const THINK_CLOSE: &str = "\n</think>\n\n";

/// Whether reasoning text is shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReasoningDisplay {
    /// Reasoning fields are stripped; only answer content is forwarded.
    #[default]
    Hidden,
    /// Reasoning is inlined into content inside `<think>` delimiters.
    Visible,
}

impl ReasoningDisplay {
    #[must_use]
    pub const fn from_flag(show_reasoning: bool) -> Self {
        if show_reasoning {
            ReasoningDisplay::Visible
        } else {
            ReasoningDisplay::Hidden
        }
    }

    #[must_use]
    pub const fn is_visible(self) -> bool {
        matches!(self, ReasoningDisplay::Visible)
    }
}

/// Render a complete message from its reasoning and answer parts.
#[must_use]
pub fn render_message(display: ReasoningDisplay, reasoning: Option<&str>, content: &str) -> String {
    match reasoning.filter(|text| !text.is_empty()) {
        Some(reasoning) if display.is_visible() => {
            let mut out = String::with_capacity(
                THINK_OPEN.len() + reasoning.len() + THINK_CLOSE.len() + content.len(),
            );
            out.push_str(THINK_OPEN);
            out.push_str(reasoning);
            out.push_str(THINK_CLOSE);
            out.push_str(content);
            out
        }
        _ => content.to_string(),
    }
}
