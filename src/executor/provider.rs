//! Provider integrations for different LLM APIs
//!
//! Supports:
//! - OpenAI (GPT / o1 models)
//! - Anthropic (Claude models)
//! - Google (Gemini models)
//!
//! Each integration implements [`ProviderClient`]. The [`ProviderRegistry`]
//! holds the model-name-pattern → client mapping table, built once at
//! configuration time; resolution is a pure lookup and an unmatched name is
//! a fatal [`ExecutorError::UnsupportedModel`].
//!
//! # Examples
//!
//! ```no_run
//! use credence::executor::provider::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_defaults();
//! assert!(registry.resolve("gpt-4o").is_ok());
//! assert!(registry.resolve("claude-3-5-sonnet-20241022").is_ok());
//! assert!(registry.resolve("mystery-model").is_err());
//! ```

use super::error::ExecutorError;
use super::schema::Schema;
use crate::config::ModelIdentity;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// One chat message sent to a provider
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }
}

/// Resolved sampling parameters for one invocation
#[derive(Debug, Clone, Copy)]
pub struct SamplingParams {
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Uniform "send messages, get text or JSON" seam over one provider family
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Free-text completion
    async fn complete(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<String, ExecutorError>;

    /// Completion constrained toward the schema via whatever native
    /// structured-output capability the provider exposes. Returns the parsed
    /// JSON value; structural validation happens one layer up.
    async fn complete_structured(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
        schema: &Schema,
    ) -> Result<Value, ExecutorError>;
}

/// Pattern matched against a model name to pick its provider
#[derive(Debug, Clone)]
pub enum NamePattern {
    Prefix(&'static str),
    Contains(&'static str),
}

impl NamePattern {
    pub fn matches(&self, name: &str) -> bool {
        match self {
            NamePattern::Prefix(prefix) => name.starts_with(prefix),
            NamePattern::Contains(needle) => name.contains(needle),
        }
    }
}

/// Model-name-pattern → provider-client mapping table, built once
pub struct ProviderRegistry {
    routes: Vec<(Vec<NamePattern>, Arc<dyn ProviderClient>)>,
}

impl ProviderRegistry {
    /// An empty registry; embedders register their own clients
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// The standard table: gpt-/o1- → OpenAI, claude- → Anthropic,
    /// gemini → Google. Credentials are env handles resolved at call time.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            vec![NamePattern::Prefix("gpt-"), NamePattern::Prefix("o1-")],
            Arc::new(OpenAiClient::new()),
        );
        registry.register(
            vec![NamePattern::Prefix("claude-")],
            Arc::new(AnthropicClient::new()),
        );
        registry.register(
            vec![
                NamePattern::Prefix("gemini-"),
                NamePattern::Contains("gemini"),
            ],
            Arc::new(GeminiClient::new()),
        );
        registry
    }

    pub fn register(&mut self, patterns: Vec<NamePattern>, client: Arc<dyn ProviderClient>) {
        self.routes.push((patterns, client));
    }

    /// Pick the provider for a model name; first matching route wins
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ProviderClient>, ExecutorError> {
        for (patterns, client) in &self.routes {
            if patterns.iter().any(|p| p.matches(name)) {
                return Ok(Arc::clone(client));
            }
        }
        Err(ExecutorError::UnsupportedModel(name.to_string()))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Strip markdown fences and surrounding prose, then parse the JSON body.
///
/// Models frequently wrap JSON in fenced code blocks or a sentence of
/// preamble even when told not to; this recovers the embedded value when
/// one exists. The error carries a preview of the offending response;
/// callers wrap it with the model name.
pub(crate) fn extract_json(text: &str) -> Result<Value, String> {
    let trimmed = text.trim();

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    // Fenced block
    if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        let body = after.strip_prefix("json").unwrap_or(after);
        if let Some(end) = body.find("```") {
            if let Ok(value) = serde_json::from_str(body[..end].trim()) {
                return Ok(value);
            }
        }
    }

    // Outermost object or array embedded in prose
    for (open, close) in [('{', '}'), ('[', ']')] {
        if let (Some(start), Some(end)) = (trimmed.find(open), trimmed.rfind(close)) {
            if start < end {
                if let Ok(value) = serde_json::from_str(&trimmed[start..=end]) {
                    return Ok(value);
                }
            }
        }
    }

    let preview: String = trimmed.chars().take(200).collect();
    Err(format!("response is not valid JSON: {}", preview))
}

fn schema_instruction(schema: &Schema) -> String {
    format!(
        "Respond with a single JSON value matching this schema, and nothing else:\n{}",
        schema.render()
    )
}

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(300))
        .build()
        .unwrap_or_default()
}

fn provider_error(model: &str, message: impl Into<String>) -> ExecutorError {
    ExecutorError::Provider {
        model: model.to_string(),
        message: message.into(),
    }
}

// ============================================================================
// OpenAI Provider
// ============================================================================

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    fallback_env: &'static str,
}

impl OpenAiClient {
    pub fn new() -> Self {
        Self::with_base_url("https://api.openai.com/v1")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
            // Credential fallback when the identity carries no handle
            fallback_env: "OPENAI_API_KEY",
        }
    }

    fn api_key(&self, identity: &ModelIdentity) -> Result<String, ExecutorError> {
        identity
            .resolve_api_key()
            .or_else(|| std::env::var(self.fallback_env).ok())
            .ok_or_else(|| provider_error(&identity.name, "OpenAI API key not found"))
    }

    async fn chat(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
        json_mode: bool,
    ) -> Result<String, ExecutorError> {
        let url = format!("{}/chat/completions", self.base_url);
        let api_key = self.api_key(identity)?;

        let request = OpenAiRequest {
            model: identity.name.clone(),
            messages: messages.to_vec(),
            temperature: params.temperature,
            max_tokens: params.max_tokens,
            response_format: json_mode.then(|| serde_json::json!({"type": "json_object"})),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| provider_error(&identity.name, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(
                &identity.name,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let parsed: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| provider_error(&identity.name, e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| provider_error(&identity.name, "No choices in response"))
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: String,
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    async fn complete(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<String, ExecutorError> {
        self.chat(identity, messages, params, false).await
    }

    async fn complete_structured(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
        schema: &Schema,
    ) -> Result<Value, ExecutorError> {
        // JSON mode guarantees a JSON object; the schema itself travels as a
        // system message since chat completions has no schema slot here
        let mut all = Vec::with_capacity(messages.len() + 1);
        all.push(ChatMessage::system(schema_instruction(schema)));
        all.extend_from_slice(messages);

        let text = self.chat(identity, &all, params, true).await?;
        extract_json(&text).map_err(|reason| provider_error(&identity.name, reason))
    }
}

// ============================================================================
// Anthropic Provider
// ============================================================================

pub struct AnthropicClient {
    client: Client,
    base_url: String,
    fallback_env: &'static str,
}

impl AnthropicClient {
    pub fn new() -> Self {
        Self::with_base_url("https://api.anthropic.com/v1")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
            fallback_env: "ANTHROPIC_API_KEY",
        }
    }

    fn api_key(&self, identity: &ModelIdentity) -> Result<String, ExecutorError> {
        identity
            .resolve_api_key()
            .or_else(|| std::env::var(self.fallback_env).ok())
            .ok_or_else(|| provider_error(&identity.name, "Anthropic API key not found"))
    }

    async fn messages(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
        system: Option<String>,
    ) -> Result<String, ExecutorError> {
        let url = format!("{}/messages", self.base_url);
        let api_key = self.api_key(identity)?;

        // Anthropic takes the system prompt as a top-level field
        let (system_parts, user_messages): (Vec<_>, Vec<_>) =
            messages.iter().cloned().partition(|m| m.role == "system");
        let system = system.or_else(|| {
            (!system_parts.is_empty()).then(|| {
                system_parts
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        });

        let request = AnthropicRequest {
            model: identity.name.clone(),
            messages: user_messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            system,
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| provider_error(&identity.name, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(
                &identity.name,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let parsed: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| provider_error(&identity.name, e.to_string()))?;

        Ok(parsed
            .content
            .into_iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct AnthropicRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
struct AnthropicContent {
    text: String,
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    async fn complete(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<String, ExecutorError> {
        self.messages(identity, messages, params, None).await
    }

    async fn complete_structured(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
        schema: &Schema,
    ) -> Result<Value, ExecutorError> {
        // No JSON mode on this API; the schema instruction rides the system
        // prompt and the reply is parsed (fences tolerated)
        let text = self
            .messages(identity, messages, params, Some(schema_instruction(schema)))
            .await?;
        extract_json(&text).map_err(|reason| provider_error(&identity.name, reason))
    }
}

// ============================================================================
// Gemini Provider
// ============================================================================

pub struct GeminiClient {
    client: Client,
    base_url: String,
    fallback_env: &'static str,
}

impl GeminiClient {
    pub fn new() -> Self {
        Self::with_base_url("https://generativelanguage.googleapis.com/v1beta")
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            base_url: base_url.into(),
            fallback_env: "GEMINI_API_KEY",
        }
    }

    fn api_key(&self, identity: &ModelIdentity) -> Result<String, ExecutorError> {
        identity
            .resolve_api_key()
            .or_else(|| std::env::var(self.fallback_env).ok())
            .ok_or_else(|| provider_error(&identity.name, "Gemini API key not found"))
    }

    async fn generate(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
        json_mime: bool,
        system: Option<String>,
    ) -> Result<String, ExecutorError> {
        let api_key = self.api_key(identity)?;
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, identity.name, api_key
        );

        let contents: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != "system")
            .map(|m| {
                serde_json::json!({
                    "role": if m.role == "assistant" { "model" } else { "user" },
                    "parts": [{"text": m.content}]
                })
            })
            .collect();

        let mut generation_config = serde_json::json!({
            "temperature": params.temperature,
            "maxOutputTokens": params.max_tokens,
        });
        if json_mime {
            generation_config["responseMimeType"] = Value::from("application/json");
        }

        let mut body = serde_json::json!({
            "contents": contents,
            "generationConfig": generation_config,
        });
        if let Some(system) = system {
            body["systemInstruction"] = serde_json::json!({"parts": [{"text": system}]});
        }

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| provider_error(&identity.name, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(provider_error(
                &identity.name,
                format!("HTTP {}: {}", status, body),
            ));
        }

        let parsed: Value = response
            .json()
            .await
            .map_err(|e| provider_error(&identity.name, e.to_string()))?;

        parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| provider_error(&identity.name, "No candidates in response"))
    }
}

impl Default for GeminiClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    async fn complete(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
    ) -> Result<String, ExecutorError> {
        self.generate(identity, messages, params, false, None).await
    }

    async fn complete_structured(
        &self,
        identity: &ModelIdentity,
        messages: &[ChatMessage],
        params: &SamplingParams,
        schema: &Schema,
    ) -> Result<Value, ExecutorError> {
        let text = self
            .generate(
                identity,
                messages,
                params,
                true,
                Some(schema_instruction(schema)),
            )
            .await?;
        extract_json(&text).map_err(|reason| provider_error(&identity.name, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_name_pattern_matching() {
        assert!(NamePattern::Prefix("gpt-").matches("gpt-4o"));
        assert!(!NamePattern::Prefix("gpt-").matches("chatgpt-4o"));
        assert!(NamePattern::Contains("gemini").matches("models/gemini-pro"));
    }

    #[test]
    fn test_default_registry_routes() {
        let registry = ProviderRegistry::with_defaults();
        assert!(registry.resolve("gpt-4o").is_ok());
        assert!(registry.resolve("o1-preview").is_ok());
        assert!(registry.resolve("claude-3-5-sonnet-20241022").is_ok());
        assert!(registry.resolve("gemini-1.5-pro").is_ok());
    }

    #[test]
    fn test_unmatched_model_is_unsupported() {
        let registry = ProviderRegistry::with_defaults();
        // resolve's Ok arm is a trait object, so never format the Ok side
        let err = registry.resolve("llama-70b").err().unwrap();
        assert!(matches!(err, ExecutorError::UnsupportedModel(name) if name == "llama-70b"));
    }

    #[test]
    fn test_extract_plain_json() {
        let value = extract_json(r#"{"score": 42}"#).unwrap();
        assert_eq!(value, json!({"score": 42}));
    }

    #[test]
    fn test_extract_fenced_json() {
        let text = "Here you go:\n```json\n{\"score\": 42}\n```\nHope that helps!";
        assert_eq!(extract_json(text).unwrap(), json!({"score": 42}));
    }

    #[test]
    fn test_extract_embedded_json() {
        let text = "Sure! The result is {\"score\": 42} as requested.";
        assert_eq!(extract_json(text).unwrap(), json!({"score": 42}));
    }

    #[test]
    fn test_extract_rejects_prose_with_preview() {
        let reason = extract_json("I cannot answer that.").unwrap_err();
        assert!(reason.contains("I cannot answer that."));
    }

    #[test]
    fn test_extract_failure_keeps_diagnostic_through_provider_error() {
        let reason = extract_json("The weather is nice today.").unwrap_err();
        let err = provider_error("gpt-4o", reason);
        let message = err.to_string();
        assert!(message.contains("gpt-4o"));
        assert!(message.contains("The weather is nice today."));
    }

    #[test]
    fn test_chat_message_roles() {
        assert_eq!(ChatMessage::user("hi").role, "user");
        assert_eq!(ChatMessage::system("rules").role, "system");
    }
}
