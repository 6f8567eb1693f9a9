use std::sync::Arc;

use crate::config::Config;
use crate::parsing::ResumeParser;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Immutable parsing pipeline; AI capability is decided once at startup.
    pub parser: Arc<ResumeParser>,
}
