//! Shared API helpers reused across ingress handlers.

mod non_streaming;
mod streaming;

pub(crate) use non_streaming::handle_non_streaming;
pub(crate) use streaming::handle_streaming;

/// Per-request names carried into response mapping and logging.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExchangeContext<'a> {
    /// The model id the caller asked for; echoed back in responses.
    pub(crate) client_model: &'a str,
    pub(crate) upstream_model: &'a str,
}
