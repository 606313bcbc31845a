//! Structured run logging utilities.
//!
//! Provides consistent, structured logging for curation runs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use dogset_models::RunId;

/// Run logger for structured logging with consistent formatting.
///
/// Every lifecycle line carries the run ID and the step being run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    operation: String,
}

impl RunLogger {
    /// Create a new run logger for a specific run and operation.
    ///
    /// # Arguments
    /// * `run_id` - The unique identifier for the run
    /// * `operation` - The step being run (e.g., "sort", "pipeline")
    pub fn new(run_id: &RunId, operation: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            run_id = %self.run_id,
            operation = %self.operation,
            "Run completed: {}", message
        );
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "run",
            run_id = %self.run_id,
            operation = %self.operation
        )
    }
}

/// Install the global subscriber: JSON when `LOG_FORMAT=json`, ANSI text otherwise.
pub fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dogset=info,dogset_media=info,dogset_curator=info,ort=warn"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}
