//! Error taxonomy for the execution core

use super::schema::Violation;
use thiserror::Error;

/// Why one consensus branch failed, kept for diagnostics
#[derive(Debug, Clone)]
pub struct ModelFailure {
    pub model: String,
    pub reason: String,
}

impl std::fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.model, self.reason)
    }
}

/// Executor errors
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Model name matches no known provider pattern. Fatal, never retried.
    #[error("No provider available for model '{0}'")]
    UnsupportedModel(String),

    /// Precondition violation (e.g. zero models for consensus). Not retried.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Network or provider failure during one attempt
    #[error("Provider error from '{model}': {message}")]
    Provider { model: String, message: String },

    /// A single invocation exceeded its timeout bound
    #[error("Model '{model}' timed out after {timeout:?}")]
    Timeout {
        model: String,
        timeout: std::time::Duration,
    },

    /// Response parsed but does not conform to the requested schema
    #[error("Response failed schema validation: {}", format_violations(.0))]
    SchemaViolations(Vec<Violation>),

    /// All retry attempts exhausted for one model
    #[error("Model '{model}' produced no valid structured output after {attempts} attempts: {last_error}")]
    StructuredOutput {
        model: String,
        attempts: u32,
        last_error: String,
    },

    /// Every branch of a consensus call failed
    #[error("All {} models failed: {}", .failures.len(), format_failures(.failures))]
    AllModelsFailed { failures: Vec<ModelFailure> },

    /// The aggregator invocation itself failed after consensus succeeded
    #[error("Aggregator '{aggregator}' failed: {source}")]
    Aggregation {
        aggregator: String,
        source: Box<ExecutorError>,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExecutorError {
    /// Errors that must not consume retry budget
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ExecutorError::UnsupportedModel(_) | ExecutorError::InvalidArgument(_)
        )
    }

    /// Violations from the last validation attempt, if that is what failed
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            ExecutorError::SchemaViolations(v) => Some(v),
            _ => None,
        }
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

fn format_failures(failures: &[ModelFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ExecutorError::UnsupportedModel("mystery-1".into()).is_fatal());
        assert!(ExecutorError::InvalidArgument("no models".into()).is_fatal());
        assert!(!ExecutorError::Provider {
            model: "gpt-4o".into(),
            message: "HTTP 500".into()
        }
        .is_fatal());
        assert!(!ExecutorError::Timeout {
            model: "gpt-4o".into(),
            timeout: std::time::Duration::from_secs(30)
        }
        .is_fatal());
    }

    #[test]
    fn test_timeout_message_keeps_subsecond_bounds() {
        let err = ExecutorError::Timeout {
            model: "gpt-4o".into(),
            timeout: std::time::Duration::from_millis(250),
        };
        let message = err.to_string();
        assert!(message.contains("250ms"), "got: {}", message);
        assert!(!message.contains("0s"));

        let whole = ExecutorError::Timeout {
            model: "gpt-4o".into(),
            timeout: std::time::Duration::from_secs(30),
        };
        assert!(whole.to_string().contains("30s"));
    }

    #[test]
    fn test_all_models_failed_lists_reasons() {
        let err = ExecutorError::AllModelsFailed {
            failures: vec![
                ModelFailure {
                    model: "gpt-4o".into(),
                    reason: "timeout".into(),
                },
                ModelFailure {
                    model: "claude-3-opus".into(),
                    reason: "HTTP 429".into(),
                },
            ],
        };
        let message = err.to_string();
        assert!(message.contains("gpt-4o: timeout"));
        assert!(message.contains("claude-3-opus: HTTP 429"));
    }
}
