//! Upstream event-stream handling.

pub mod sse;
pub mod transcoder;

pub use sse::LineBuffer;
pub use transcoder::{StreamTranscoder, TranscoderPhase};
