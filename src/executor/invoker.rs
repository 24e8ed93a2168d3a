//! Model invocation with default resolution and timeout enforcement

use super::error::ExecutorError;
use super::provider::{ChatMessage, ProviderRegistry, SamplingParams};
use super::schema::Schema;
use crate::config::{ExecutionOptions, ModelIdentity};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio::time::timeout;

/// Adapts one configured model identity into a uniform call against whichever
/// provider its name pattern selects. Stateless between calls.
#[derive(Clone)]
pub struct ModelInvoker {
    registry: Arc<ProviderRegistry>,
}

impl ModelInvoker {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// options.temperature ?? identity.temperature, options.max_tokens ??
    /// identity.max_tokens (identities carry the 0.7 / 4000 defaults)
    fn sampling_params(identity: &ModelIdentity, options: &ExecutionOptions) -> SamplingParams {
        SamplingParams {
            temperature: options.temperature.unwrap_or(identity.temperature),
            max_tokens: options.max_tokens.unwrap_or(identity.max_tokens),
        }
    }

    async fn bounded<F, T>(
        identity: &ModelIdentity,
        options: &ExecutionOptions,
        fut: F,
    ) -> Result<T, ExecutorError>
    where
        F: Future<Output = Result<T, ExecutorError>>,
    {
        match options.timeout {
            Some(limit) => match timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(ExecutorError::Timeout {
                    model: identity.name.clone(),
                    timeout: limit,
                }),
            },
            None => fut.await,
        }
    }

    /// Free-text invocation
    pub async fn invoke(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        options: &ExecutionOptions,
    ) -> Result<String, ExecutorError> {
        let client = self.registry.resolve(&identity.name)?;
        let params = Self::sampling_params(identity, options);

        tracing::debug!(model = %identity.name, temperature = params.temperature, "invoking model");
        Self::bounded(identity, options, client.complete(identity, messages, &params)).await
    }

    /// Structured invocation; returns the provider's parsed JSON value.
    /// Schema conformance is checked by the caller.
    pub async fn invoke_structured(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        options: &ExecutionOptions,
        schema: &Schema,
    ) -> Result<Value, ExecutorError> {
        let client = self.registry.resolve(&identity.name)?;
        let params = Self::sampling_params(identity, options);

        tracing::debug!(model = %identity.name, "invoking model (structured)");
        Self::bounded(
            identity,
            options,
            client.complete_structured(identity, messages, &params, schema),
        )
        .await
    }
}

/// Estimated consumed tokens over prompt + response, `ceil(chars / 4)`.
/// Derived, not authoritative.
pub fn estimate_tokens(prompt: &str, response: &str) -> u32 {
    let chars = prompt.chars().count() + response.chars().count();
    chars.div_ceil(4) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_estimate_rounds_up() {
        assert_eq!(estimate_tokens("", ""), 0);
        assert_eq!(estimate_tokens("abcd", ""), 1);
        assert_eq!(estimate_tokens("abcde", ""), 2);
        assert_eq!(estimate_tokens("abcd", "efgh"), 2);
    }

    #[test]
    fn test_options_override_identity_defaults() {
        let identity = ModelIdentity::new("gpt-4o"); // 0.7 / 4000
        let options = ExecutionOptions::default()
            .with_temperature(0.1)
            .with_max_tokens(512);

        let params = ModelInvoker::sampling_params(&identity, &options);
        assert_eq!(params.temperature, 0.1);
        assert_eq!(params.max_tokens, 512);

        let defaults = ModelInvoker::sampling_params(&identity, &ExecutionOptions::default());
        assert_eq!(defaults.temperature, 0.7);
        assert_eq!(defaults.max_tokens, 4000);
    }
}
