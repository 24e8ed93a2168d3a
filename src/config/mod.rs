//! Model configuration for the execution core
//!
//! A [`ModelIdentity`] names one model (the provider is inferred from the
//! name pattern), carries its credential handle and its default sampling
//! parameters. [`ExecutionOptions`] are per-call overrides; when a field is
//! absent the identity's defaults apply.
//!
//! # Examples
//!
//! ## Building identities by hand
//!
//! ```
//! use credence::config::{ExecutionOptions, ModelIdentity};
//! use std::time::Duration;
//!
//! let model = ModelIdentity::new("gpt-4o")
//!     .with_api_key("OPENAI_API_KEY") // References env var
//!     .with_temperature(0.3);
//! model.validate().unwrap();
//!
//! let options = ExecutionOptions::default()
//!     .with_timeout(Duration::from_secs(30))
//!     .with_max_retries(5);
//! ```
//!
//! ## Assembling from the environment
//!
//! Callers typically build their model list from whichever provider
//! credentials are present:
//!
//! ```no_run
//! let models = credence::config::models_from_env();
//! assert!(!models.is_empty());
//! ```
//!
//! ## Environment Variables
//!
//! - OPENAI_API_KEY
//! - ANTHROPIC_API_KEY
//! - GEMINI_API_KEY

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Default sampling temperature when neither options nor identity set one
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Default maximum output tokens
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Default number of structured-output attempts per model
pub const DEFAULT_MAX_RETRIES: u32 = 3;

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// One configured model: provider-qualified name, credential handle and
/// default sampling parameters. Immutable once built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelIdentity {
    /// Model name, used to select the provider integration
    /// (e.g. "gpt-4o", "claude-3-5-sonnet-20241022", "gemini-1.5-pro")
    pub name: String,

    /// API key (can be environment variable name like "OPENAI_API_KEY")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default temperature (0.0 - 2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Default maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl ModelIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::ValidationError(
                "Model name cannot be empty".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve API key from environment variable if needed
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.as_ref().and_then(|key| {
            // If the key looks like an env var name, try to resolve it
            if key.chars().all(|c| c.is_uppercase() || c == '_') {
                std::env::var(key).ok()
            } else {
                Some(key.clone())
            }
        })
    }
}

/// Per-call overrides for one execution. Absent fields fall back to the
/// [`ModelIdentity`] defaults.
#[derive(Debug, Clone, Default)]
pub struct ExecutionOptions {
    /// Override the identity's temperature
    pub temperature: Option<f32>,

    /// Override the identity's max output tokens
    pub max_tokens: Option<u32>,

    /// Bound on a single model invocation; exceeding it counts as that
    /// attempt's failure
    pub timeout: Option<Duration>,

    /// Maximum structured-output attempts per model (default 3)
    pub max_retries: Option<u32>,
}

impl ExecutionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Effective retry budget for the structured path
    pub fn effective_max_retries(&self) -> u32 {
        self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES)
    }
}

/// Assemble a model list from whichever provider credentials are present.
///
/// One identity per configured provider family, referencing the credential
/// by environment variable name so keys are re-read at call time.
pub fn models_from_env() -> Vec<ModelIdentity> {
    let mut models = Vec::new();

    if std::env::var("OPENAI_API_KEY").is_ok() {
        models.push(ModelIdentity::new("gpt-4o").with_api_key("OPENAI_API_KEY"));
    }

    if std::env::var("ANTHROPIC_API_KEY").is_ok() {
        models.push(
            ModelIdentity::new("claude-3-5-sonnet-20241022").with_api_key("ANTHROPIC_API_KEY"),
        );
    }

    if std::env::var("GEMINI_API_KEY").is_ok() {
        models.push(ModelIdentity::new("gemini-1.5-pro").with_api_key("GEMINI_API_KEY"));
    }

    tracing::info!(count = models.len(), "assembled model list from environment");
    models
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_defaults() {
        let identity = ModelIdentity::new("gpt-4o");
        assert!(identity.validate().is_ok());
        assert_eq!(identity.temperature, 0.7);
        assert_eq!(identity.max_tokens, 4000);
        assert!(identity.api_key.is_none());
    }

    #[test]
    fn test_identity_validation() {
        let mut identity = ModelIdentity::new("gpt-4o");
        assert!(identity.validate().is_ok());

        identity.temperature = 3.0;
        assert!(identity.validate().is_err());

        identity.temperature = 0.7;
        identity.max_tokens = 0;
        assert!(identity.validate().is_err());

        let unnamed = ModelIdentity::new("");
        assert!(unnamed.validate().is_err());
    }

    #[test]
    fn test_resolve_literal_api_key() {
        // Lowercase keys are treated as literal credentials, not env handles
        let identity = ModelIdentity::new("gpt-4o").with_api_key("sk-literal-key");
        assert_eq!(identity.resolve_api_key().as_deref(), Some("sk-literal-key"));
    }

    #[test]
    fn test_options_default_retries() {
        let options = ExecutionOptions::default();
        assert_eq!(options.effective_max_retries(), 3);
        assert_eq!(options.with_max_retries(5).effective_max_retries(), 5);
    }

    #[test]
    fn test_identity_deserializes_with_defaults() {
        let identity: ModelIdentity = serde_json::from_str(r#"{"name":"claude-3-opus"}"#).unwrap();
        assert_eq!(identity.temperature, 0.7);
        assert_eq!(identity.max_tokens, 4000);
    }
}
