// Per-command correlation for structured logs

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::Span;
use uuid::Uuid;

/// Correlation ID tying a command's log lines together
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Span and timing of one dispatched command
#[derive(Debug)]
pub struct CommandTrace {
    pub command: &'static str,
    pub correlation_id: CorrelationId,
    started: Instant,
    span: Span,
}

impl CommandTrace {
    pub fn start(command: &'static str) -> Self {
        let correlation_id = CorrelationId::generate();
        let span = tracing::info_span!(
            "fcm_command",
            command,
            correlation_id = %correlation_id,
        );
        Self {
            command,
            correlation_id,
            started: Instant::now(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        self.span.clone()
    }

    /// Log the outcome inside the command span
    pub fn finish<T, E: std::fmt::Display>(&self, outcome: &Result<T, E>) {
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        let _entered = self.span.enter();
        match outcome {
            Ok(_) => tracing::debug!(elapsed_ms, "command resolved"),
            Err(error) => tracing::warn!(elapsed_ms, error = %error, "command rejected"),
        }
    }
}
