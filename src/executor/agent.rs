//! Single-agent executor: one model, optional schema-validated retry loop
//!
//! Two distinct entry points keep the dual-mode contract explicit:
//! [`AgentExecutor::execute_agent`] is the plain-text path — one invocation,
//! no retry, no validation — and [`AgentExecutor::execute_agent_typed`] is
//! the structured path with a bounded retry loop. Omitting the schema can
//! never trigger validation or escalation code.
//!
//! # Examples
//!
//! ```no_run
//! use credence::{AgentExecutor, ExecutionOptions, ModelIdentity};
//! use credence::executor::provider::ProviderRegistry;
//! use credence::executor::schema::{Field, Kind, Schema};
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! #[derive(Deserialize)]
//! struct Report {
//!     score: f64,
//!     verdict: String,
//! }
//!
//! # async fn example() -> Result<(), credence::ExecutorError> {
//! let executor = AgentExecutor::new(Arc::new(ProviderRegistry::with_defaults()));
//! let model = ModelIdentity::new("gpt-4o");
//! let schema = Schema::object(vec![
//!     Field::required("score", Kind::number_between(0.0, 100.0)),
//!     Field::required("verdict", Kind::string()),
//! ]);
//!
//! let report: Report = executor
//!     .execute_agent_typed(&model, "Rate this profile...", &ExecutionOptions::default(), &schema)
//!     .await?
//!     .content;
//! # Ok(())
//! # }
//! ```

use super::error::ExecutorError;
use super::escalation::escalate_prompt;
use super::invoker::{estimate_tokens, ModelInvoker};
use super::provider::{ChatMessage, ProviderRegistry};
use super::schema::{Schema, ValidationOutcome, Violation};
use crate::config::{ExecutionOptions, ModelIdentity};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Result of one model invocation
#[derive(Debug, Clone)]
pub struct ResponseEnvelope<T> {
    /// Raw text, or the schema-validated typed value
    pub content: T,
    /// Identity string of the model (or synthetic consensus label)
    pub model: String,
    /// Estimated consumed tokens, `ceil(chars / 4)` over prompt + response
    pub tokens_used: u32,
    /// Wall-clock duration of the call
    pub elapsed: Duration,
}

/// Drives models through invocation, validation and retry. Explicitly
/// constructed and dependency-injected; holds no state between calls.
#[derive(Clone)]
pub struct AgentExecutor {
    invoker: ModelInvoker,
}

impl AgentExecutor {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self {
            invoker: ModelInvoker::new(registry),
        }
    }

    /// One invocation, raw text back. No retry, no validation.
    pub async fn execute_agent(
        &self,
        identity: &ModelIdentity,
        prompt: &str,
        options: &ExecutionOptions,
    ) -> Result<ResponseEnvelope<String>, ExecutorError> {
        let start = Instant::now();
        let messages = [ChatMessage::user(prompt)];

        let text = self.invoker.invoke(identity, &messages, options).await?;
        let tokens_used = estimate_tokens(prompt, &text);

        tracing::debug!(model = %identity.name, tokens_used, "agent call complete");
        Ok(ResponseEnvelope {
            content: text,
            model: identity.name.clone(),
            tokens_used,
            elapsed: start.elapsed(),
        })
    }

    /// Structured path: bounded retry loop with validation and prompt
    /// escalation. Attempt 0 sends `prompt` unmodified; later attempts add
    /// schema instructions and the previous attempt's violations. The first
    /// conforming response wins; exhaustion raises
    /// [`ExecutorError::StructuredOutput`].
    pub async fn execute_agent_typed<T>(
        &self,
        identity: &ModelIdentity,
        prompt: &str,
        options: &ExecutionOptions,
        schema: &Schema,
    ) -> Result<ResponseEnvelope<T>, ExecutorError>
    where
        T: DeserializeOwned,
    {
        let max_retries = options.effective_max_retries();
        if max_retries == 0 {
            return Err(ExecutorError::InvalidArgument(
                "max_retries must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let mut last_error = String::new();
        let mut last_violations: Vec<Violation> = Vec::new();

        for attempt in 0..max_retries {
            let attempt_prompt = if attempt == 0 {
                prompt.to_string()
            } else {
                escalate_prompt(prompt, schema, &last_violations)
            };
            let messages = [ChatMessage::user(attempt_prompt.as_str())];

            let value = match self
                .invoker
                .invoke_structured(identity, &messages, options, schema)
                .await
            {
                Ok(value) => value,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        model = %identity.name,
                        attempt = attempt + 1,
                        error = %e,
                        "structured attempt failed"
                    );
                    last_error = e.to_string();
                    last_violations.clear();
                    continue;
                }
            };

            match schema.validate(&value) {
                ValidationOutcome::Valid => {
                    let serialized = value.to_string();
                    match serde_json::from_value::<T>(value) {
                        Ok(content) => {
                            let tokens_used = estimate_tokens(&attempt_prompt, &serialized);
                            tracing::debug!(
                                model = %identity.name,
                                attempt = attempt + 1,
                                "structured response validated"
                            );
                            return Ok(ResponseEnvelope {
                                content,
                                model: identity.name.clone(),
                                tokens_used,
                                elapsed: start.elapsed(),
                            });
                        }
                        Err(e) => {
                            // Conforms to the schema but not to T; the schema
                            // and target type are out of step
                            last_error = format!("deserialization failed: {}", e);
                            last_violations.clear();
                        }
                    }
                }
                ValidationOutcome::Invalid(violations) => {
                    let failure = ExecutorError::SchemaViolations(violations.clone());
                    tracing::warn!(
                        model = %identity.name,
                        attempt = attempt + 1,
                        error = %failure,
                        "response failed validation"
                    );
                    last_error = failure.to_string();
                    last_violations = violations;
                }
            }
        }

        Err(ExecutorError::StructuredOutput {
            model: identity.name.clone(),
            attempts: max_retries,
            last_error,
        })
    }
}
