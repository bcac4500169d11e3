mod request_id;

use crate::config::AppConfig;
use crate::error::BridgeError;
use crate::protocol::reasoning::ReasoningDisplay;
use crate::routing::ModelRouter;
use crate::transport::{HttpTransport, PreparedUpstream, RetryPolicy};

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers.
///
/// Built once at startup and never mutated afterwards.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub model_router: ModelRouter,
    pub upstream: PreparedUpstream,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        model_router: ModelRouter,
        upstream: PreparedUpstream,
    ) -> Self {
        tracing::debug!(
            known_models = model_router.known_model_count(),
            upstream = %upstream.chat_url(),
            "application state initialized"
        );
        Self {
            config,
            transport,
            model_router,
            upstream,
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Build every derived component from a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the upstream endpoint cannot be prepared.
    pub fn from_config(config: AppConfig) -> Result<Self, BridgeError> {
        let upstream = PreparedUpstream::new(&config.upstream)?;
        let transport =
            HttpTransport::new(&config.server, RetryPolicy::from_config(&config.upstream));
        let model_router = ModelRouter::new(&config);
        Ok(Self::new(config, transport, model_router, upstream))
    }

    #[must_use]
    pub fn reasoning_display(&self) -> ReasoningDisplay {
        ReasoningDisplay::from_flag(self.config.features.show_reasoning)
    }

    #[must_use]
    pub fn next_completion_id(&self) -> String {
        self.request_ids.next_completion_id()
    }
}
